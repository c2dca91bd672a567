//! Manufacturer entity

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted manufacturer row
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Manufacturer {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// Staged manufacturer record, ready for upsert
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewManufacturer {
    pub name: String,
    pub slug: String,
}
