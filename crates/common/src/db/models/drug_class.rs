//! Drug class entity
//!
//! Drug classes are managed outside the import pipeline; the pipeline only
//! reads them to resolve the optional `Generic -> DrugClass` reference.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted drug class row
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DrugClass {
    pub id: i64,
    pub name: String,
    pub slug: String,
}
