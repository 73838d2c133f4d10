//! Canonical-name suggestions for non-canonical field ids.
//!
//! Two tiers: a synonym table (`name` → `full_name`), then Levenshtein
//! distance against canonical names in the same category with a threshold of
//! `max(2, len/3)`.

use serde::Serialize;

use crate::schema::{self, RECOMMENDED_SCHEMA};

/// A suggested canonical replacement for a field id.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub canonical: String,
    pub description: String,
    /// `"synonym"` or `"similar"`.
    pub reason: &'static str,
}

/// Common alternative names mapped to canonical field names (sans category).
const SYNONYMS: &[(&str, &str)] = &[
    ("name", "full_name"),
    ("fullname", "full_name"),
    ("display_name", "full_name"),
    ("firstname", "first_name"),
    ("given_name", "first_name"),
    ("lastname", "last_name"),
    ("family_name", "last_name"),
    ("surname", "last_name"),
    ("mail", "email"),
    ("email_address", "email"),
    ("dob", "date_of_birth"),
    ("birthday", "date_of_birth"),
    ("birth_date", "date_of_birth"),
    ("birthdate", "date_of_birth"),
    ("telephone", "phone"),
    ("phone_number", "phone"),
    ("mobile", "phone"),
    // addresses
    ("street", "home_street"),
    ("address", "home_street"),
    ("city", "home_city"),
    ("state", "home_state"),
    ("province", "home_state"),
    ("zip", "home_zip"),
    ("zipcode", "home_zip"),
    ("zip_code", "home_zip"),
    ("postal_code", "home_zip"),
    ("postal", "home_zip"),
    ("country", "home_country"),
    ("country_code", "home_country"),
    // financial
    ("social_security", "ssn"),
    ("social_security_number", "ssn"),
    // payment
    ("cc_number", "card_number"),
    ("card_num", "card_number"),
    ("cc_expiry", "card_expiry"),
    ("expiry", "card_expiry"),
    ("expiry_date", "card_expiry"),
    ("exp_date", "card_expiry"),
    ("card_name", "cardholder_name"),
    // employment
    ("company", "employer"),
    ("job", "title"),
    ("position", "title"),
    ("role", "title"),
    // preferences
    ("tz", "timezone"),
    ("lang", "language"),
    ("locale", "language"),
];

/// Suggest a canonical id for a non-canonical field, or `None` when the
/// field is already canonical or nothing is close enough.
#[must_use]
pub fn suggest_canonical(id: &str) -> Option<Suggestion> {
    if schema::is_canonical_field(id) {
        return None;
    }

    let (category, field_name) = id.split_once('.')?;

    // Tier 1: synonym lookup.
    if let Some((_, canonical)) = SYNONYMS.iter().find(|(alias, _)| *alias == field_name) {
        let candidate = format!("{category}.{canonical}");
        if let Some(sf) = schema::schema_field(&candidate) {
            return Some(Suggestion {
                canonical: candidate,
                description: sf.description.to_owned(),
                reason: "synonym",
            });
        }
    }

    // Tier 2: Levenshtein within the same category.
    let threshold = (field_name.len() / 3).max(2);
    let mut best: Option<Suggestion> = None;
    let mut best_dist = threshold + 1;

    for cat in RECOMMENDED_SCHEMA.categories {
        if cat.name != category {
            continue;
        }
        for sf in cat.fields {
            let Some((_, schema_name)) = sf.id.split_once('.') else {
                continue;
            };
            let dist = levenshtein(field_name, schema_name);
            if dist > 0 && dist <= threshold && dist < best_dist {
                best_dist = dist;
                best = Some(Suggestion {
                    canonical: sf.id.to_owned(),
                    description: sf.description.to_owned(),
                    reason: "similar",
                });
            }
        }
    }

    best
}

/// Levenshtein edit distance over bytes, single-row DP.
fn levenshtein(a: &str, b: &str) -> usize {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut curr = vec![0usize; b.len() + 1];
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        prev = curr;
    }
    prev[b.len()]
}
