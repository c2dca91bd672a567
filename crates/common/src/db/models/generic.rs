//! Generic (drug generic name) entity

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted generic row
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Generic {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub drug_class_id: Option<i64>,
    pub indication: Option<String>,
}

/// Staged generic record, ready for upsert
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGeneric {
    pub name: String,
    pub slug: String,
    /// Resolved by case-insensitive name match against persisted drug classes
    pub drug_class_id: Option<i64>,
    pub indication: Option<String>,
}
