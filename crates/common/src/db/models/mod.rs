//! Catalog entity models
//!
//! Each entity has a persisted form (read back from the store, with its
//! surrogate id) and a staged `New*` form (what the import pipeline writes).
//! The `slug` column is the natural key used for upsert conflict resolution.

mod dosage_form;
mod drug_class;
mod generic;
mod manufacturer;
mod medicine;

pub use dosage_form::{DosageForm, NewDosageForm};
pub use drug_class::DrugClass;
pub use generic::{Generic, NewGeneric};
pub use manufacturer::{Manufacturer, NewManufacturer};
pub use medicine::{Medicine, NewMedicine};
