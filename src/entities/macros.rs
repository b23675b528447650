//! Macros for reducing boilerplate when defining entities

/// Define an entity struct and its [`Entity`](crate::core::entity::Entity) implementation
///
/// Injects `id` (backend-assigned, empty on drafts) and `created_at`. Every
/// listed field must implement [`FieldAccess`](crate::core::entity::FieldAccess);
/// nested structs get it from [`impl_field_access!`](crate::impl_field_access).
/// Missing fields deserialize to their defaults.
///
/// # Example
///
/// ```rust,ignore
/// use clinic::prelude::*;
///
/// impl_entity!(
///     Appointment,
///     "appointments",
///     {
///         patient_id: String,
///         confirmed: bool,
///         notes: Option<String>,
///     }
/// );
///
/// // Usage
/// let draft = Appointment::new("p-1".to_string(), false, None);
/// assert_eq!(draft.field_value("confirmed"), Some(FieldValue::Boolean(false)));
/// ```
#[macro_export]
macro_rules! impl_entity {
    (
        $type:ident,
        $resource:expr,
        {
            $( $(#[$meta:meta])* $field:ident : $field_type:ty ),* $(,)?
        }
    ) => {
        #[derive(Debug, Clone, Default, PartialEq, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(default)]
        pub struct $type {
            /// Unique identifier, assigned by the backend
            pub id: String,

            /// When this entity was created
            pub created_at: ::chrono::DateTime<::chrono::Utc>,
            $( $(#[$meta])* pub $field : $field_type ),*
        }

        impl $crate::core::entity::Entity for $type {
            fn resource_name() -> &'static str {
                $resource
            }

            fn id(&self) -> &str {
                &self.id
            }

            fn assign_id(&mut self, id: String) {
                self.id = id;
            }

            fn field_value(&self, path: &str) -> Option<$crate::core::field::FieldValue> {
                use $crate::core::entity::FieldAccess;

                let (head, rest) = $crate::core::entity::split_path(path);
                match head {
                    "id" if rest.is_empty() => {
                        Some($crate::core::field::FieldValue::String(self.id.clone()))
                    }
                    "created_at" => self.created_at.get_path(rest),
                    $( stringify!($field) => self.$field.get_path(rest), )*
                    _ => None,
                }
            }

            fn set_field_value(
                &mut self,
                path: &str,
                value: $crate::core::field::FieldValue,
            ) -> Result<(), $crate::core::error::CollectionError> {
                use $crate::core::entity::FieldAccess;

                let (head, rest) = $crate::core::entity::split_path(path);
                let result = match head {
                    "id" => Err("id cannot be changed".to_string()),
                    "created_at" => self.created_at.set_path(rest, value),
                    $( stringify!($field) => self.$field.set_path(rest, value), )*
                    _ => Err(format!("unknown field '{}'", head)),
                };
                result.map_err(|message| $crate::core::error::CollectionError::field(path, message))
            }
        }

        impl $type {
            /// A draft not yet known to the backend
            #[allow(clippy::too_many_arguments)]
            pub fn new($( $field: $field_type ),*) -> Self {
                Self {
                    id: String::new(),
                    created_at: ::chrono::Utc::now(),
                    $( $field ),*
                }
            }
        }
    };
}
