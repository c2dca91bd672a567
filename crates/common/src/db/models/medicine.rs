//! Medicine (brand) entity

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Persisted medicine row
#[derive(Clone, Debug, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub brand_name: String,
    pub strength: String,
    pub slug: String,
    pub generic_id: i64,
    pub manufacturer_id: Option<i64>,
    pub dosage_form_id: Option<i64>,
    pub icon_url: Option<String>,
}

/// Staged medicine record, ready for upsert
///
/// The slug is derived from brand name plus strength so that different
/// strengths of the same brand stay distinct rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMedicine {
    pub brand_name: String,
    pub strength: String,
    pub slug: String,
    pub generic_id: i64,
    pub manufacturer_id: Option<i64>,
    pub dosage_form_id: Option<i64>,
    pub icon_url: Option<String>,
}
