//! Recommended field catalog.
//!
//! A static schema that consumers can discover to agree on canonical field
//! names and sensible default sensitivities. The vault itself accepts any
//! syntactically valid identifier — the schema only informs defaults and
//! suggestions.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::Serialize;

/// A recommended field.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaField {
    pub id: &'static str,
    pub description: &'static str,
    pub sensitivity: &'static str,
}

/// A group of recommended fields.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaCategory {
    pub name: &'static str,
    pub description: &'static str,
    pub fields: &'static [SchemaField],
}

/// The full recommended schema.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub version: &'static str,
    pub categories: &'static [SchemaCategory],
}

/// The canonical schema served at `GET /vault/schema`.
pub static RECOMMENDED_SCHEMA: Schema = Schema {
    version: "1",
    categories: &[
        SchemaCategory {
            name: "identity",
            description: "Personal identity information",
            fields: &[
                SchemaField { id: "identity.first_name", description: "First/given name", sensitivity: "standard" },
                SchemaField { id: "identity.last_name", description: "Last/family name", sensitivity: "standard" },
                SchemaField { id: "identity.full_name", description: "Full display name", sensitivity: "standard" },
                SchemaField { id: "identity.email", description: "Primary email address", sensitivity: "standard" },
                SchemaField { id: "identity.phone", description: "Phone number", sensitivity: "sensitive" },
                SchemaField { id: "identity.date_of_birth", description: "Date of birth", sensitivity: "sensitive" },
            ],
        },
        SchemaCategory {
            name: "addresses",
            description: "Physical addresses",
            fields: &[
                SchemaField { id: "addresses.home_street", description: "Home street address", sensitivity: "sensitive" },
                SchemaField { id: "addresses.home_city", description: "Home city", sensitivity: "standard" },
                SchemaField { id: "addresses.home_state", description: "Home state or province", sensitivity: "standard" },
                SchemaField { id: "addresses.home_zip", description: "Home ZIP or postal code", sensitivity: "standard" },
                SchemaField { id: "addresses.home_country", description: "Home country code (e.g. US)", sensitivity: "standard" },
            ],
        },
        SchemaCategory {
            name: "financial",
            description: "Financial and tax information",
            fields: &[
                SchemaField { id: "financial.filing_status", description: "Tax filing status", sensitivity: "sensitive" },
                SchemaField { id: "financial.ssn", description: "Social Security Number", sensitivity: "critical" },
            ],
        },
        SchemaCategory {
            name: "payment",
            description: "Payment card details",
            fields: &[
                SchemaField { id: "payment.card_number", description: "Payment card number", sensitivity: "critical" },
                SchemaField { id: "payment.card_expiry", description: "Card expiration date", sensitivity: "critical" },
                SchemaField { id: "payment.cardholder_name", description: "Name on payment card", sensitivity: "critical" },
                SchemaField { id: "payment.card_brand", description: "Card brand (e.g. Visa, Mastercard)", sensitivity: "standard" },
            ],
        },
        SchemaCategory {
            name: "preferences",
            description: "User preferences",
            fields: &[
                SchemaField { id: "preferences.timezone", description: "Preferred timezone (e.g. America/New_York)", sensitivity: "public" },
                SchemaField { id: "preferences.language", description: "Preferred language (e.g. en)", sensitivity: "public" },
            ],
        },
        SchemaCategory {
            name: "employment",
            description: "Employment information",
            fields: &[
                SchemaField { id: "employment.employer", description: "Current employer name", sensitivity: "standard" },
                SchemaField { id: "employment.title", description: "Job title", sensitivity: "standard" },
            ],
        },
        SchemaCategory {
            name: "medical",
            description: "Medical information (user-defined fields)",
            fields: &[],
        },
        SchemaCategory {
            name: "documents",
            description: "Document references (user-defined fields)",
            fields: &[],
        },
    ],
};

fn schema_index() -> &'static HashMap<&'static str, &'static SchemaField> {
    static INDEX: OnceLock<HashMap<&'static str, &'static SchemaField>> = OnceLock::new();
    INDEX.get_or_init(|| {
        RECOMMENDED_SCHEMA
            .categories
            .iter()
            .flat_map(|cat| cat.fields.iter())
            .map(|f| (f.id, f))
            .collect()
    })
}

/// Whether the field id is part of the recommended schema.
#[must_use]
pub fn is_canonical_field(id: &str) -> bool {
    schema_index().contains_key(id)
}

/// The schema entry for a canonical id, if any.
#[must_use]
pub fn schema_field(id: &str) -> Option<&'static SchemaField> {
    schema_index().get(id).copied()
}

/// The schema default sensitivity for a field id, `standard` otherwise.
#[must_use]
pub fn default_sensitivity(id: &str) -> &'static str {
    schema_field(id).map_or("standard", |f| f.sensitivity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_fields_are_indexed() {
        assert!(is_canonical_field("identity.full_name"));
        assert!(is_canonical_field("payment.card_number"));
        assert!(!is_canonical_field("identity.nonexistent"));
    }

    #[test]
    fn default_sensitivity_follows_schema() {
        assert_eq!(default_sensitivity("financial.ssn"), "critical");
        assert_eq!(default_sensitivity("preferences.timezone"), "public");
        assert_eq!(default_sensitivity("custom.field"), "standard");
    }

    #[test]
    fn schema_ids_carry_their_category_prefix() {
        for cat in RECOMMENDED_SCHEMA.categories {
            for field in cat.fields {
                assert!(
                    field.id.starts_with(&format!("{}.", cat.name)),
                    "{} not under {}",
                    field.id,
                    cat.name
                );
            }
        }
    }
}
