//! Staff accounts, as listed in the admin panel

use crate::core::field::FieldFormat;
use crate::core::validation::{FieldRules, validators};
use crate::engine::{CollectionDescriptor, FilterRule};

/// Roles a staff account can hold
pub const ROLES: [&str; 3] = ["admin", "doctor", "assistant"];

crate::impl_entity!(
    User,
    "users",
    {
        name: String,
        email: String,
        role: String,
        active: bool,
    }
);

impl User {
    pub fn descriptor() -> CollectionDescriptor<User> {
        CollectionDescriptor::for_entity()
            .filter("role", FilterRule::field_equals("role").with_match_all("all"))
            .filter("active", FilterRule::field_equals("active"))
            .searchable(["name", "email"])
    }

    pub fn rules() -> FieldRules {
        FieldRules::new()
            .rule("name", validators::required())
            .rule("email", validators::required())
            .rule("email", validators::format(FieldFormat::Email))
            .rule(
                "role",
                validators::in_list(ROLES.iter().map(|r| r.to_string()).collect()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::FilterSpec;

    fn user(role: &str, active: bool) -> User {
        User::new("Ana".into(), "ana@example.com".into(), role.into(), active)
    }

    #[test]
    fn test_role_filter_with_sentinel() {
        let descriptor = User::descriptor();
        let doctor = user("doctor", true);
        assert!(descriptor.matches(&doctor, &FilterSpec::new().with("role", "doctor")));
        assert!(!descriptor.matches(&doctor, &FilterSpec::new().with("role", "admin")));
        assert!(descriptor.matches(&doctor, &FilterSpec::new().with("role", "all")));
    }

    #[test]
    fn test_rules_reject_unknown_role() {
        assert!(User::rules().validate(&user("admin", true)).is_ok());
        let err = User::rules().validate(&user("owner", true)).unwrap_err();
        match err {
            crate::core::error::CollectionError::Validation(v) => {
                assert_eq!(v.fields(), vec!["role"])
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
