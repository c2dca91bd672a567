//! Dosage form entity

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted dosage form row
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DosageForm {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub icon_url: Option<String>,
}

/// Staged dosage form record, ready for upsert
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDosageForm {
    pub name: String,
    pub slug: String,
    /// Either the original external URL or an inlined `data:` URL
    pub icon_url: Option<String>,
}
