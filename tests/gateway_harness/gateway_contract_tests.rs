//! Macro-generated test suite for `CollectionGateway<Patient>` contract validation.
//!
//! The `gateway_contract_tests!` macro generates a test module that validates
//! any `CollectionGateway<Patient>` implementation seeded with
//! [`sample_patients`](super::sample_patients) against the full contract.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod gateway_harness;
//!
//! use gateway_harness::*;
//!
//! gateway_contract_tests!(patient_store());
//! ```
//!
//! # Generated Tests
//!
//! ## List
//! - `test_list_unpaged`: no page returns every entity and the total
//! - `test_list_paged`: page slice plus total of the whole match set
//! - `test_list_page_past_end`: empty slice, no error
//! - `test_list_filter_and_search`: AND filters plus OR search
//! - `test_list_sentinel_filter`: "all" disables the status filter
//! - `test_list_unknown_filter`: rejected as validation error
//!
//! ## Mutations
//! - `test_get_missing`: NotFound
//! - `test_create_assigns_id`
//! - `test_create_rejects_invalid`: Validation, nothing stored
//! - `test_update_patch` / `test_set_field`
//! - `test_update_missing`: NotFound
//! - `test_remove_idempotent`: second remove succeeds, entity gone
//! - `test_concurrent_updates`: parallel set_field from spawned tasks

/// Generate a `CollectionGateway<Patient>` conformance test suite.
///
/// `$factory` must evaluate to a gateway holding exactly the sample patients.
/// It is re-evaluated for each test. For the concurrency test, the gateway
/// must also implement `Clone + 'static` (shared state via Arc pattern).
#[macro_export]
macro_rules! gateway_contract_tests {
    ($factory:expr) => {
        mod gateway_contract {
            use super::*;
            use clinic::prelude::*;

            fn by_name() -> Option<SortSpec> {
                Some(SortSpec::ascending("name"))
            }

            // ==================================================================
            // List
            // ==================================================================

            #[tokio::test]
            async fn test_list_unpaged() {
                let gateway = $factory;
                let result = gateway.list(&ListQuery::default()).await.unwrap();
                assert_eq!(result.total, 5);
                assert_eq!(result.items.len(), 5);
            }

            #[tokio::test]
            async fn test_list_paged() {
                let gateway = $factory;
                let query = ListQuery {
                    sort: by_name(),
                    page: Some(PageSpec::new(2, 2).unwrap()),
                    ..ListQuery::default()
                };
                let result = gateway.list(&query).await.unwrap();
                assert_eq!(result.total, 5);
                assert_eq!(names(&result.items), vec!["Carla", "Davi"]);
            }

            #[tokio::test]
            async fn test_list_page_past_end() {
                let gateway = $factory;
                let query = ListQuery {
                    page: Some(PageSpec::new(4, 2).unwrap()),
                    ..ListQuery::default()
                };
                let result = gateway.list(&query).await.unwrap();
                assert!(result.items.is_empty());
                assert_eq!(result.total, 5);
            }

            #[tokio::test]
            async fn test_list_filter_and_search() {
                let gateway = $factory;
                let query = ListQuery {
                    filter: FilterSpec::new()
                        .with("favorite", true)
                        .with_search("DAV"),
                    sort: by_name(),
                    page: None,
                };
                let result = gateway.list(&query).await.unwrap();
                assert_eq!(names(&result.items), vec!["Davi"]);
                assert_eq!(result.total, 1);
            }

            #[tokio::test]
            async fn test_list_sentinel_filter() {
                let gateway = $factory;
                let query = ListQuery {
                    filter: FilterSpec::new().with("status", "all"),
                    ..ListQuery::default()
                };
                assert_eq!(gateway.list(&query).await.unwrap().total, 5);

                let query = ListQuery {
                    filter: FilterSpec::new().with("status", "inactive"),
                    ..ListQuery::default()
                };
                assert_eq!(gateway.list(&query).await.unwrap().total, 0);
            }

            #[tokio::test]
            async fn test_list_unknown_filter() {
                let gateway = $factory;
                let query = ListQuery {
                    filter: FilterSpec::new().with("insurance", "none"),
                    ..ListQuery::default()
                };
                let err = gateway.list(&query).await.unwrap_err();
                assert!(matches!(err, CollectionError::Validation(_)));
            }

            // ==================================================================
            // Mutations
            // ==================================================================

            #[tokio::test]
            async fn test_get_missing() {
                let gateway = $factory;
                let err = gateway.get_by_id("nobody").await.unwrap_err();
                assert!(matches!(err, CollectionError::NotFound { .. }));
            }

            #[tokio::test]
            async fn test_create_assigns_id() {
                let gateway = $factory;
                let created = gateway.create(patient("", "Fabio", false)).await.unwrap();
                assert!(!created.id.is_empty());
                assert!(!created.is_temporary());
                assert_eq!(gateway.get_by_id(&created.id).await.unwrap().name, "Fabio");
                assert_eq!(gateway.list(&ListQuery::default()).await.unwrap().total, 6);
            }

            #[tokio::test]
            async fn test_create_rejects_invalid() {
                let gateway = $factory;
                let mut draft = patient("", "Gil", false);
                draft.cpf = "12".to_string();
                let err = gateway.create(draft).await.unwrap_err();
                match err {
                    CollectionError::Validation(v) => assert_eq!(v.fields(), vec!["cpf"]),
                    other => panic!("expected validation error, got {:?}", other),
                }
                assert_eq!(gateway.list(&ListQuery::default()).await.unwrap().total, 5);
            }

            #[tokio::test]
            async fn test_update_patch() {
                let gateway = $factory;
                let mut patch = Patch::new();
                patch.insert("name".into(), "Ana Lima".into());
                patch.insert("address.city".into(), "Natal".into());
                let updated = gateway.update("p1", &patch).await.unwrap();
                assert_eq!(updated.name, "Ana Lima");
                assert_eq!(updated.address.unwrap().city, "Natal");
                assert_eq!(gateway.get_by_id("p1").await.unwrap().name, "Ana Lima");
            }

            #[tokio::test]
            async fn test_set_field() {
                let gateway = $factory;
                let updated = gateway.set_field("p1", "favorite", true.into()).await.unwrap();
                assert!(updated.favorite);
                assert!(gateway.get_by_id("p1").await.unwrap().favorite);
            }

            #[tokio::test]
            async fn test_update_missing() {
                let gateway = $factory;
                let err = gateway
                    .set_field("nobody", "favorite", true.into())
                    .await
                    .unwrap_err();
                assert!(matches!(err, CollectionError::NotFound { .. }));
            }

            #[tokio::test]
            async fn test_remove_idempotent() {
                let gateway = $factory;
                gateway.remove("p3").await.unwrap();
                gateway.remove("p3").await.unwrap();
                assert!(matches!(
                    gateway.get_by_id("p3").await.unwrap_err(),
                    CollectionError::NotFound { .. }
                ));
                assert_eq!(gateway.list(&ListQuery::default()).await.unwrap().total, 4);
            }

            #[tokio::test]
            async fn test_concurrent_updates() {
                let gateway = $factory;
                let mut handles = Vec::new();
                for id in ["p1", "p2", "p3", "p4", "p5"] {
                    let gateway = gateway.clone();
                    handles.push(tokio::spawn(async move {
                        gateway.set_field(id, "status", "inactive".into()).await
                    }));
                }
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }

                let query = ListQuery {
                    filter: FilterSpec::new().with("status", "inactive"),
                    ..ListQuery::default()
                };
                assert_eq!(gateway.list(&query).await.unwrap().total, 5);
            }
        }
    };
}
