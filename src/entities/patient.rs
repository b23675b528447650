//! Patients of a clinic

use crate::core::field::FieldFormat;
use crate::core::validation::{FieldRules, validators};
use crate::engine::{CollectionDescriptor, FilterRule};
use serde::{Deserialize, Serialize};

/// Postal address; every part optional except the city
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    pub street: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub zip: Option<String>,
}

crate::impl_field_access!(Address { street, city, state, zip });

crate::impl_entity!(
    Patient,
    "patients",
    {
        name: String,
        cpf: String,
        email: Option<String>,
        phone: Option<String>,
        favorite: bool,
        /// "active" or "inactive"
        status: String,
        address: Option<Address>,
        birth_date: Option<String>,
    }
);

impl Patient {
    /// Filters the patient list offers, searchable by name, CPF, email and phone
    pub fn descriptor() -> CollectionDescriptor<Patient> {
        CollectionDescriptor::for_entity()
            .filter(
                "status",
                FilterRule::field_equals("status").with_match_all("all"),
            )
            .filter("favorite", FilterRule::field_equals("favorite"))
            .filter("city", FilterRule::field_contains("address.city"))
            .searchable(["name", "cpf", "email", "phone"])
    }

    pub fn rules() -> FieldRules {
        FieldRules::new()
            .rule("name", validators::required())
            .rule("name", validators::string_length(2, 120))
            .rule("cpf", validators::required())
            .rule("cpf", validators::format(FieldFormat::Cpf))
            .rule("email", validators::format(FieldFormat::Email))
            .rule("phone", validators::format(FieldFormat::Phone))
            .rule(
                "status",
                validators::in_list(vec!["active".into(), "inactive".into()]),
            )
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}
