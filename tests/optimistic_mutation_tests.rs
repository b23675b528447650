//! Optimistic mutation coordinator: local patches, reconciliation, exact
//! rollback and the one-mutation-per-id rule.

#[macro_use]
mod gateway_harness;

use clinic::prelude::*;
use gateway_harness::*;
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn by_name() -> ViewOptions {
    ViewOptions::default().default_sort(SortSpec::ascending("name"))
}

// ==================================================================
// Update / toggle
// ==================================================================

#[tokio::test(start_paused = true)]
async fn test_toggle_is_visible_before_the_gateway_answers() {
    let (view, gateway) = loaded_view(by_name()).await;
    gateway.delay_mutations(ms(100));

    let toggling = tokio::spawn({
        let view = view.clone();
        async move { view.toggle_field("p1", "favorite").await }
    });
    tokio::time::sleep(ms(10)).await;
    assert!(view.get("p1").unwrap().favorite);
    assert!(view.is_pending("p1"));

    let saved = toggling.await.unwrap().unwrap();
    assert!(saved.favorite);
    assert!(view.get("p1").unwrap().favorite);
    assert!(!view.is_pending("p1"));
    assert!(gateway.store().get_by_id("p1").await.unwrap().favorite);
}

#[tokio::test(start_paused = true)]
async fn test_failed_toggle_restores_exact_previous_value() {
    let (view, gateway) = loaded_view(by_name()).await;
    let original = view.get("p1").unwrap();
    assert!(!original.favorite);

    gateway.delay_mutations(ms(100));
    gateway.fail_next(Op::SetField, CollectionError::network("timeout"));

    let toggling = tokio::spawn({
        let view = view.clone();
        async move { view.toggle_field("p1", "favorite").await }
    });
    tokio::time::sleep(ms(10)).await;
    assert!(view.get("p1").unwrap().favorite);

    let err = toggling.await.unwrap().unwrap_err();
    assert!(matches!(err, CollectionError::Network { .. }));
    assert_eq!(view.get("p1").unwrap(), original);
    assert_eq!(view.get("p1").unwrap().field_value("favorite"), Some(FieldValue::Boolean(false)));
    assert_eq!(view.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_replaced_by_server_entity() {
    let (view, _gateway) = loaded_view(by_name()).await;

    let mut patch = Patch::new();
    patch.insert("phone".into(), "+5581999990000".into());
    patch.insert("address.city".into(), "Olinda".into());
    let saved = view.update("p3", patch).await.unwrap();

    assert_eq!(view.get("p3").unwrap(), saved);
    assert_eq!(saved.address.unwrap().city, "Olinda");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_patch_never_reaches_gateway() {
    let (view, gateway) = loaded_view(by_name()).await;
    let before = view.get("p2").unwrap();

    let err = view.set_field("p2", "favorite", "yes").await.unwrap_err();
    assert!(matches!(err, CollectionError::Validation(_)));
    assert_eq!(gateway.count(Op::SetField), 0);
    assert_eq!(view.get("p2").unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_update_rolls_back() {
    let (view, _gateway) = loaded_view(by_name()).await;
    let before = view.get("p2").unwrap();

    // cpf format is enforced by the backend only
    let err = view.set_field("p2", "cpf", "1").await.unwrap_err();
    assert!(matches!(err, CollectionError::Validation(_)));
    assert_eq!(view.get("p2").unwrap(), before);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_requires_local_boolean_field() {
    let (view, gateway) = loaded_view(by_name()).await;

    assert!(matches!(
        view.toggle_field("nobody", "favorite").await,
        Err(CollectionError::NotFound { .. })
    ));
    assert!(matches!(
        view.toggle_field("p1", "name").await,
        Err(CollectionError::InvalidArgument { .. })
    ));
    assert!(matches!(
        view.toggle_field("p1", "weight").await,
        Err(CollectionError::InvalidArgument { .. })
    ));
    assert_eq!(gateway.count(Op::SetField), 0);
}

// ==================================================================
// One mutation per id
// ==================================================================

#[tokio::test(start_paused = true)]
async fn test_second_mutation_on_same_id_conflicts() {
    let (view, gateway) = loaded_view(by_name()).await;
    gateway.delay_mutations(ms(100));

    let first = tokio::spawn({
        let view = view.clone();
        async move { view.toggle_field("p1", "favorite").await }
    });
    tokio::time::sleep(ms(10)).await;

    let err = view.toggle_field("p1", "favorite").await.unwrap_err();
    assert!(matches!(err, CollectionError::Conflict { .. }));
    assert!(err.is_retryable());
    assert!(matches!(
        view.remove("p1").await,
        Err(CollectionError::Conflict { .. })
    ));

    // other ids are independent
    view.toggle_field("p2", "favorite").await.unwrap();

    first.await.unwrap().unwrap();
    assert_eq!(gateway.count(Op::SetField), 2);
    assert!(view.get("p1").unwrap().favorite);

    let again = view.toggle_field("p1", "favorite").await.unwrap();
    assert!(!again.favorite);
}

// ==================================================================
// Refetch while pending
// ==================================================================

#[tokio::test(start_paused = true)]
async fn test_pending_patch_survives_refetch_then_rolls_back() {
    let (view, gateway) = loaded_view(by_name()).await;
    gateway.delay_mutations(ms(200));
    gateway.fail_next(Op::SetField, CollectionError::network("timeout"));

    let toggling = tokio::spawn({
        let view = view.clone();
        async move { view.toggle_field("p1", "favorite").await }
    });
    tokio::time::sleep(ms(10)).await;

    view.refresh().await.unwrap();
    assert!(view.get("p1").unwrap().favorite, "refetch dropped the optimistic patch");

    assert!(toggling.await.unwrap().is_err());
    assert!(!view.get("p1").unwrap().favorite);
}

#[tokio::test(start_paused = true)]
async fn test_older_list_response_keeps_reconciled_entity() {
    let (view, gateway) = loaded_view(by_name()).await;
    gateway.read_lists_early();
    gateway.delay_next_list(ms(500));

    let refreshing = tokio::spawn({
        let view = view.clone();
        async move { view.refresh().await }
    });
    tokio::time::sleep(ms(10)).await;

    let saved = view.toggle_field("p1", "favorite").await.unwrap();
    assert!(saved.favorite);
    view.remove("p2").await.unwrap();

    refreshing.await.unwrap().unwrap();
    assert!(gateway.store().get_by_id("p1").await.unwrap().favorite);
    assert_eq!(view.get("p1").unwrap(), saved);
    assert!(view.get("p2").is_none());
    assert_eq!(view.snapshot().total, 4);

    // a list issued after the mutations is trusted as is
    view.refresh().await.unwrap();
    assert!(view.get("p1").unwrap().favorite);
    assert_eq!(ids(&view.snapshot().items), vec!["p1", "p3", "p4", "p5"]);
}

#[tokio::test(start_paused = true)]
async fn test_older_list_response_keeps_created_entity() {
    let (view, gateway) = loaded_view(ViewOptions::default()).await;
    gateway.read_lists_early();
    gateway.delay_next_list(ms(500));

    let refreshing = tokio::spawn({
        let view = view.clone();
        async move { view.refresh().await }
    });
    tokio::time::sleep(ms(10)).await;

    let created = view.create(patient("", "Fabio", false)).await.unwrap();
    refreshing.await.unwrap().unwrap();

    let state = view.snapshot();
    assert_eq!(state.total, 6);
    assert_eq!(state.items[0], created);
}

// ==================================================================
// Remove
// ==================================================================

#[tokio::test(start_paused = true)]
async fn test_remove_twice_decrements_total_once() {
    let options = by_name().pagination(PaginationMode::Server);
    let (view, gateway) = loaded_view(options).await;
    assert_eq!(view.snapshot().total, 5);

    view.remove("p2").await.unwrap();
    assert_eq!(view.snapshot().total, 4);
    assert!(view.get("p2").is_none());

    view.remove("p2").await.unwrap();
    assert_eq!(view.snapshot().total, 4);
    assert_eq!(gateway.count(Op::Remove), 2);

    view.refresh().await.unwrap();
    assert_eq!(view.snapshot().total, 4);
}

#[tokio::test(start_paused = true)]
async fn test_failed_remove_reinserts_at_original_position() {
    let (view, gateway) = loaded_view(ViewOptions::default()).await;
    let before = view.snapshot();
    gateway.delay_mutations(ms(100));
    gateway.fail_next(Op::Remove, CollectionError::network("offline"));

    let removing = tokio::spawn({
        let view = view.clone();
        async move { view.remove("p3").await }
    });
    tokio::time::sleep(ms(10)).await;
    let during = view.snapshot();
    assert_eq!(ids(&during.items), vec!["p1", "p2", "p4", "p5"]);
    assert_eq!(during.total, 4);

    assert!(removing.await.unwrap().is_err());
    let after = view.snapshot();
    assert_eq!(ids(&after.items), ids(&before.items));
    assert_eq!(after.total, 5);
}

// ==================================================================
// Create
// ==================================================================

#[tokio::test(start_paused = true)]
async fn test_create_shows_temporary_row_then_server_entity() {
    let options = ViewOptions::default().pagination(PaginationMode::Server);
    let (view, gateway) = loaded_view(options).await;
    gateway.delay_mutations(ms(100));

    let creating = tokio::spawn({
        let view = view.clone();
        async move { view.create(patient("", "Fabio", false)).await }
    });
    tokio::time::sleep(ms(10)).await;

    let during = view.snapshot();
    assert_eq!(during.total, 6);
    assert_eq!(during.items[0].name, "Fabio");
    assert!(during.items[0].is_temporary());
    assert_eq!(view.pending_creates(), 1);

    let created = creating.await.unwrap().unwrap();
    assert!(!created.is_temporary());

    let after = view.snapshot();
    assert_eq!(after.total, 6);
    assert_eq!(after.items[0], created);
    assert!(after.items.iter().all(|p| !p.is_temporary()));
    assert_eq!(view.pending_creates(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_create_removes_temporary_row() {
    let (view, _gateway) = loaded_view(ViewOptions::default()).await;

    let mut draft = patient("", "Gil", false);
    draft.cpf = "bad".into();
    let err = view.create(draft).await.unwrap_err();
    match err {
        CollectionError::Validation(v) => assert_eq!(v.fields(), vec!["cpf"]),
        other => panic!("expected validation error, got {:?}", other),
    }

    let state = view.snapshot();
    assert_eq!(state.total, 5);
    assert!(state.items.iter().all(|p| p.name != "Gil"));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_creates_correlate_by_token() {
    let (view, gateway) = loaded_view(ViewOptions::default()).await;
    gateway.delay_mutations(ms(100));

    let first = tokio::spawn({
        let view = view.clone();
        let mut draft = patient("", "Fabio", false);
        draft.cpf = "bad".into();
        async move { view.create(draft).await }
    });
    let second = tokio::spawn({
        let view = view.clone();
        async move { view.create(patient("", "Gil", false)).await }
    });
    tokio::time::sleep(ms(10)).await;
    assert_eq!(view.pending_creates(), 2);

    // the refetch keeps both temporary rows on top
    view.refresh().await.unwrap();
    assert_eq!(view.snapshot().total, 7);

    assert!(first.await.unwrap().is_err());
    let gil = second.await.unwrap().unwrap();

    let state = view.snapshot();
    assert_eq!(state.total, 6);
    assert!(state.items.iter().any(|p| p.id == gil.id));
    assert!(state.items.iter().all(|p| p.name != "Fabio"));
}

#[tokio::test(start_paused = true)]
async fn test_mutations_need_a_signed_in_user() {
    init();
    let gateway = ScriptedGateway::new(patient_store());
    let session = std::sync::Arc::new(SharedSession::new(SessionState::SignedOut));
    let view = patient_view(gateway.clone(), session, ViewOptions::default());

    assert_eq!(
        view.create(patient("", "Fabio", false)).await,
        Err(CollectionError::Unauthenticated)
    );
    assert_eq!(view.remove("p1").await, Err(CollectionError::Unauthenticated));
    assert_eq!(gateway.count(Op::Create) + gateway.count(Op::Remove), 0);
}

#[tokio::test(start_paused = true)]
async fn test_mutation_events() {
    let (view, gateway) = loaded_view(by_name()).await;
    let mut events = view.subscribe();
    gateway.fail_next(Op::SetField, CollectionError::network("timeout"));

    view.toggle_field("p1", "favorite").await.unwrap_err();
    view.toggle_field("p1", "favorite").await.unwrap();

    let mut seen = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        assert_eq!(envelope.collection, "patients");
        seen.push(envelope.event);
    }
    assert!(matches!(seen[0], ViewEvent::MutationApplied { kind: MutationKind::Update, .. }));
    assert!(matches!(seen[1], ViewEvent::MutationRolledBack { .. }));
    assert!(matches!(seen[2], ViewEvent::MutationApplied { .. }));
    assert!(matches!(seen[3], ViewEvent::MutationReconciled { .. }));
}
