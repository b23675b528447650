//! Service invoices issued through the fiscal backend

use crate::core::entity::FieldAccess;
use crate::core::field::FieldValue;
use crate::core::validation::{FieldRules, validators};
use crate::engine::{CollectionDescriptor, FilterRule};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an invoice
///
/// ```text
/// draft ──▶ processing ──▶ issued ──▶ cancelled
///   │           │  ▲
///   │           ▼  │
///   │         failed
///   └──▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Processing,
    Issued,
    Failed,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Processing => "processing",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Failed => "failed",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "processing" => Some(InvoiceStatus::Processing),
            "issued" => Some(InvoiceStatus::Issued),
            "failed" => Some(InvoiceStatus::Failed),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether the fiscal backend accepts moving from `self` to `next`
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        *self == next
            || matches!(
                (self, next),
                (Draft, Processing)
                    | (Draft, Cancelled)
                    | (Processing, Issued)
                    | (Processing, Failed)
                    | (Failed, Processing)
                    | (Issued, Cancelled)
            )
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldAccess for InvoiceStatus {
    fn get_path(&self, path: &str) -> Option<FieldValue> {
        path.is_empty()
            .then(|| FieldValue::String(self.as_str().to_string()))
    }

    fn set_path(&mut self, path: &str, value: FieldValue) -> Result<(), String> {
        if !path.is_empty() {
            return Err(format!("status has no sub-field '{}'", path));
        }
        let parsed = value
            .as_string()
            .and_then(InvoiceStatus::parse)
            .ok_or_else(|| format!("unknown invoice status {:?}", value.to_json()))?;
        *self = parsed;
        Ok(())
    }
}

crate::impl_entity!(
    Invoice,
    "invoices",
    {
        number: String,
        patient_id: String,
        patient_name: String,
        amount: f64,
        status: InvoiceStatus,
        issued_at: Option<DateTime<Utc>>,
        /// Reason reported by the fiscal backend when issuing failed
        error_message: Option<String>,
    }
);

impl Invoice {
    pub fn descriptor() -> CollectionDescriptor<Invoice> {
        CollectionDescriptor::for_entity()
            .filter(
                "status",
                FilterRule::field_equals("status").with_match_all("all"),
            )
            .filter("patient_id", FilterRule::field_equals("patient_id"))
            .filter("min_amount", FilterRule::field_at_least("amount"))
            .filter("max_amount", FilterRule::field_at_most("amount"))
            .searchable(["number", "patient_name"])
    }

    pub fn rules() -> FieldRules {
        FieldRules::new()
            .rule("patient_id", validators::required())
            .rule("amount", validators::positive())
    }

    /// Update guard rejecting status changes the fiscal backend would refuse
    pub fn check_transition(current: &Invoice, next: &Invoice) -> Result<(), String> {
        if current.status.can_transition_to(next.status) {
            Ok(())
        } else {
            Err(format!(
                "invoice cannot go from {} to {}",
                current.status, next.status
            ))
        }
    }
}
