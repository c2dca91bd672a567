//! Import pipeline orchestration
//!
//! One run flows strictly forward: Reading -> Normalizing -> Resolving ->
//! Writing -> Done. Base entities (dosage forms, manufacturers, generics) are
//! extracted from the medicine rows and written first; persisted rows are
//! then re-read to build the lookup tables the medicine stage resolves
//! against. There is no persisted job entity and no retry of the whole run —
//! every write is an upsert on the slug natural key, so re-running the same
//! input is safe.

use crate::icons::IconFetcher;
use crate::normalize::{derive_dosage_form, normalize_name, slugify};
use crate::reader::RowRecord;
use crate::report::{ImportError, ImportReport, ImportResult};
use crate::resolver::{dedupe_by_key, resolve_reference, Lookup, Strategy};
use crate::writer::upsert_in_batches;
use rxcatalog_common::config::{IconConfig, ImportConfig};
use rxcatalog_common::db::models::*;
use rxcatalog_common::errors::Result;
use rxcatalog_common::{metrics, CatalogStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

// Accepted header aliases per column
const COL_BRAND: &[&str] = &["brand name", "brand", "name"];
const COL_STRENGTH: &[&str] = &["strength", "dosage"];
const COL_GENERIC: &[&str] = &["generic name", "generic"];
const COL_MANUFACTURER: &[&str] = &["manufacturer", "manufacturer name", "company"];
const COL_IMAGE: &[&str] = &["image", "image url", "icon", "icon url"];
const COL_DRUG_CLASS: &[&str] = &["drug class", "class"];
const COL_INDICATION: &[&str] = &["indication", "indications"];

/// The catalog import pipeline
pub struct CatalogImporter {
    store: Arc<dyn CatalogStore>,
    icons: IconFetcher,
    config: ImportConfig,
}

impl CatalogImporter {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        import_config: ImportConfig,
        icon_config: &IconConfig,
    ) -> Self {
        Self {
            store,
            icons: IconFetcher::new(icon_config),
            config: import_config,
        }
    }

    /// Run one import over already-parsed rows and return the aggregate
    /// result. Store-level connectivity failures during lookup fetches abort
    /// the run; everything else is accumulated into the result.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn run(&self, rows: Vec<RowRecord>) -> Result<ImportResult> {
        let started = Instant::now();
        let total_rows = rows.len();
        let mut report = ImportReport::new();

        info!(rows = total_rows, "Import run started");

        // Base entities are embedded in the medicine rows; write them first.
        let base = self.write_base_entities(&rows).await?;
        report.absorb(base);

        // Feedback step: re-read persisted reference rows so medicine FK
        // resolution sees ids for everything the previous stage just wrote.
        let dosage_forms = self.store.list_dosage_forms().await?;
        let manufacturers = self.store.list_manufacturers().await?;
        let generics = self.store.list_generics().await?;

        let form_by_slug =
            Lookup::from_pairs(dosage_forms.iter().map(|f| (f.slug.clone(), f.id)));
        let maker_by_slug =
            Lookup::from_pairs(manufacturers.iter().map(|m| (m.slug.clone(), m.id)));
        let generic_by_slug =
            Lookup::from_pairs(generics.iter().map(|g| (g.slug.clone(), g.id)));
        let generic_by_name =
            Lookup::from_pairs(generics.iter().map(|g| (normalize_name(&g.name), g.id)));

        // Stage, validate, and dedupe medicines.
        let mut medicines = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            match stage_medicine(
                index,
                row,
                &generic_by_slug,
                &generic_by_name,
                &maker_by_slug,
                &form_by_slug,
            ) {
                Ok(medicine) => medicines.push(medicine),
                Err(error) => report.record_row_error(error),
            }
        }

        let deduped = dedupe_by_key(medicines, |m| m.slug.clone());
        report.record_skipped(deduped.duplicates as u64);

        let written = upsert_in_batches(deduped.unique, self.config.medicine_batch_size, {
            let store = self.store.clone();
            move |batch| {
                let store = store.clone();
                async move { store.upsert_medicines(&batch).await }
            }
        })
        .await;
        report.absorb(written);

        let message = format!(
            "Catalog import finished: {} imported, {} updated, {} skipped, {} failed",
            report.imported, report.updated, report.skipped, report.failed
        );
        info!(
            imported = report.imported,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = started.elapsed().as_millis() as u64,
            "Import run finished"
        );

        let result = report.finish(message, self.config.max_reported_errors);
        metrics::record_import(
            started.elapsed().as_secs_f64(),
            result.imported,
            result.updated,
            result.skipped,
            result.failed,
            result.success,
        );

        Ok(result)
    }

    /// Extract, dedupe, and upsert the base entities referenced by the
    /// medicine rows. Their write counts feed the aggregate report; rows that
    /// simply lack an optional reference are not errors at this stage.
    async fn write_base_entities(&self, rows: &[RowRecord]) -> Result<ImportReport> {
        let mut report = ImportReport::new();
        let batch_size = self.config.reference_batch_size;

        // Dosage forms, inferred from the icon filename.
        let mut forms = Vec::new();
        for row in rows {
            let image_url = row.field_trimmed(COL_IMAGE);
            let name = derive_dosage_form(image_url);
            if name.is_empty() {
                continue;
            }
            forms.push(NewDosageForm {
                slug: slugify(&name),
                name,
                icon_url: Some(image_url.to_string()),
            });
        }
        let mut forms = dedupe_by_key(forms, |f| f.slug.clone()).unique;
        for form in &mut forms {
            if let Some(ref url) = form.icon_url {
                form.icon_url = Some(self.icons.inline_or_passthrough(url).await);
            }
        }
        info!(count = forms.len(), "Staged dosage forms");
        report.absorb(
            upsert_in_batches(forms, batch_size, {
                let store = self.store.clone();
                move |batch| {
                    let store = store.clone();
                    async move { store.upsert_dosage_forms(&batch).await }
                }
            })
            .await,
        );

        // Manufacturers.
        let makers: Vec<NewManufacturer> = rows
            .iter()
            .filter_map(|row| {
                let name = row.field_trimmed(COL_MANUFACTURER);
                if name.is_empty() {
                    return None;
                }
                Some(NewManufacturer {
                    name: name.to_string(),
                    slug: slugify(name),
                })
            })
            .collect();
        let makers = dedupe_by_key(makers, |m| m.slug.clone()).unique;
        info!(count = makers.len(), "Staged manufacturers");
        report.absorb(
            upsert_in_batches(makers, batch_size, {
                let store = self.store.clone();
                move |batch| {
                    let store = store.clone();
                    async move { store.upsert_manufacturers(&batch).await }
                }
            })
            .await,
        );

        // Generics, with the optional drug-class reference resolved by
        // case-insensitive name match against already-persisted classes.
        let drug_classes = self.store.list_drug_classes().await?;
        let class_by_name =
            Lookup::from_pairs(drug_classes.iter().map(|c| (normalize_name(&c.name), c.id)));

        let staged_generics: Vec<NewGeneric> = rows
            .iter()
            .filter_map(|row| {
                let name = row.field_trimmed(COL_GENERIC);
                if name.is_empty() {
                    return None;
                }
                let class_name = row.field_trimmed(COL_DRUG_CLASS);
                let indication = row.field_trimmed(COL_INDICATION);
                Some(NewGeneric {
                    name: name.to_string(),
                    slug: slugify(name),
                    drug_class_id: class_by_name.get(&normalize_name(class_name)),
                    indication: if indication.is_empty() {
                        None
                    } else {
                        Some(indication.to_string())
                    },
                })
            })
            .collect();
        let staged_generics = dedupe_by_key(staged_generics, |g| g.slug.clone()).unique;
        info!(count = staged_generics.len(), "Staged generics");
        report.absorb(
            upsert_in_batches(staged_generics, batch_size, {
                let store = self.store.clone();
                move |batch| {
                    let store = store.clone();
                    async move { store.upsert_generics(&batch).await }
                }
            })
            .await,
        );

        Ok(report)
    }
}

/// Validate and resolve one medicine row.
///
/// The generic reference is mandatory: a row whose generic does not resolve
/// is excluded, never written with a null foreign key. Manufacturer and
/// dosage-form references are nullable.
fn stage_medicine(
    index: usize,
    row: &RowRecord,
    generic_by_slug: &Lookup,
    generic_by_name: &Lookup,
    maker_by_slug: &Lookup,
    form_by_slug: &Lookup,
) -> std::result::Result<NewMedicine, ImportError> {
    let brand_name = row.field_trimmed(COL_BRAND);
    if brand_name.is_empty() {
        return Err(ImportError::row(
            index,
            "brand name",
            brand_name,
            "missing brand name",
        ));
    }

    let strength = row.field_trimmed(COL_STRENGTH);

    // Brand name plus strength, so different strengths of one brand stay
    // distinct rows.
    let slug = if strength.is_empty() {
        slugify(brand_name)
    } else {
        slugify(&format!("{} {}", brand_name, strength))
    };
    if slug.is_empty() {
        return Err(ImportError::row(
            index,
            "brand name",
            brand_name,
            "brand name produces an empty slug",
        ));
    }

    let generic_raw = row.field_trimmed(COL_GENERIC);
    let generic_strategies = [
        Strategy::new(slugify, generic_by_slug),
        Strategy::new(normalize_name, generic_by_name),
    ];
    let generic_id = match resolve_reference(generic_raw, &generic_strategies) {
        Some(id) => id,
        None => {
            return Err(ImportError::row(
                index,
                "generic name",
                generic_raw,
                "generic does not match any persisted generic",
            ));
        }
    };

    let maker_strategies = [Strategy::new(slugify, maker_by_slug)];
    let manufacturer_id =
        resolve_reference(row.field_trimmed(COL_MANUFACTURER), &maker_strategies);

    let image_url = row.field_trimmed(COL_IMAGE);
    let form_strategies = [Strategy::new(slugify, form_by_slug)];
    let dosage_form_id = resolve_reference(&derive_dosage_form(image_url), &form_strategies);

    Ok(NewMedicine {
        brand_name: brand_name.to_string(),
        strength: strength.to_string(),
        slug,
        generic_id,
        manufacturer_id,
        dosage_form_id,
        icon_url: if image_url.is_empty() {
            None
        } else {
            Some(image_url.to_string())
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::parse_delimited_text;
    use async_trait::async_trait;
    use rxcatalog_common::errors::AppError;
    use rxcatalog_common::UpsertStats;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store with slug-keyed upsert semantics and scriptable
    /// per-call failures for the medicines table.
    #[derive(Default)]
    struct MockStore {
        dosage_forms: Mutex<Vec<DosageForm>>,
        manufacturers: Mutex<Vec<Manufacturer>>,
        generics: Mutex<Vec<Generic>>,
        drug_classes: Mutex<Vec<DrugClass>>,
        medicines: Mutex<Vec<Medicine>>,
        next_id: AtomicI64,
        medicine_calls: AtomicUsize,
        failing_medicine_calls: Vec<usize>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                next_id: AtomicI64::new(1),
                ..Default::default()
            }
        }

        fn with_drug_classes(self, classes: &[(&str, i64)]) -> Self {
            {
                let mut table = self.drug_classes.lock().unwrap();
                for (name, id) in classes {
                    table.push(DrugClass {
                        id: *id,
                        name: name.to_string(),
                        slug: slugify(name),
                    });
                }
            }
            self
        }

        fn alloc_id(&self) -> i64 {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        }

        fn medicine_count(&self) -> usize {
            self.medicines.lock().unwrap().len()
        }

        fn medicine_by_slug(&self, slug: &str) -> Option<Medicine> {
            self.medicines
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.slug == slug)
                .cloned()
        }
    }

    #[async_trait]
    impl CatalogStore for MockStore {
        async fn upsert_dosage_forms(&self, rows: &[NewDosageForm]) -> Result<UpsertStats> {
            let mut table = self.dosage_forms.lock().unwrap();
            let mut stats = UpsertStats::default();
            for row in rows {
                if let Some(existing) = table.iter_mut().find(|f| f.slug == row.slug) {
                    existing.name = row.name.clone();
                    existing.icon_url = row.icon_url.clone();
                    stats.updated += 1;
                } else {
                    table.push(DosageForm {
                        id: self.alloc_id(),
                        name: row.name.clone(),
                        slug: row.slug.clone(),
                        icon_url: row.icon_url.clone(),
                    });
                    stats.inserted += 1;
                }
            }
            Ok(stats)
        }

        async fn upsert_manufacturers(&self, rows: &[NewManufacturer]) -> Result<UpsertStats> {
            let mut table = self.manufacturers.lock().unwrap();
            let mut stats = UpsertStats::default();
            for row in rows {
                if let Some(existing) = table.iter_mut().find(|m| m.slug == row.slug) {
                    existing.name = row.name.clone();
                    stats.updated += 1;
                } else {
                    table.push(Manufacturer {
                        id: self.alloc_id(),
                        name: row.name.clone(),
                        slug: row.slug.clone(),
                    });
                    stats.inserted += 1;
                }
            }
            Ok(stats)
        }

        async fn upsert_generics(&self, rows: &[NewGeneric]) -> Result<UpsertStats> {
            let mut table = self.generics.lock().unwrap();
            let mut stats = UpsertStats::default();
            for row in rows {
                if let Some(existing) = table.iter_mut().find(|g| g.slug == row.slug) {
                    existing.name = row.name.clone();
                    existing.drug_class_id = row.drug_class_id;
                    existing.indication = row.indication.clone();
                    stats.updated += 1;
                } else {
                    table.push(Generic {
                        id: self.alloc_id(),
                        name: row.name.clone(),
                        slug: row.slug.clone(),
                        drug_class_id: row.drug_class_id,
                        indication: row.indication.clone(),
                    });
                    stats.inserted += 1;
                }
            }
            Ok(stats)
        }

        async fn upsert_medicines(&self, rows: &[NewMedicine]) -> Result<UpsertStats> {
            let call = self.medicine_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_medicine_calls.contains(&call) {
                return Err(AppError::Internal {
                    message: "simulated store failure".into(),
                });
            }

            let mut table = self.medicines.lock().unwrap();
            let mut stats = UpsertStats::default();
            for row in rows {
                if let Some(existing) = table.iter_mut().find(|m| m.slug == row.slug) {
                    existing.brand_name = row.brand_name.clone();
                    existing.strength = row.strength.clone();
                    existing.generic_id = row.generic_id;
                    existing.manufacturer_id = row.manufacturer_id;
                    existing.dosage_form_id = row.dosage_form_id;
                    existing.icon_url = row.icon_url.clone();
                    stats.updated += 1;
                } else {
                    table.push(Medicine {
                        id: self.alloc_id(),
                        brand_name: row.brand_name.clone(),
                        strength: row.strength.clone(),
                        slug: row.slug.clone(),
                        generic_id: row.generic_id,
                        manufacturer_id: row.manufacturer_id,
                        dosage_form_id: row.dosage_form_id,
                        icon_url: row.icon_url.clone(),
                    });
                    stats.inserted += 1;
                }
            }
            Ok(stats)
        }

        async fn list_dosage_forms(&self) -> Result<Vec<DosageForm>> {
            Ok(self.dosage_forms.lock().unwrap().clone())
        }

        async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>> {
            Ok(self.manufacturers.lock().unwrap().clone())
        }

        async fn list_generics(&self) -> Result<Vec<Generic>> {
            Ok(self.generics.lock().unwrap().clone())
        }

        async fn list_drug_classes(&self) -> Result<Vec<DrugClass>> {
            Ok(self.drug_classes.lock().unwrap().clone())
        }
    }

    fn importer(store: Arc<MockStore>) -> CatalogImporter {
        importer_with_config(store, ImportConfig {
            reference_batch_size: 100,
            medicine_batch_size: 500,
            max_reported_errors: 10,
        })
    }

    fn importer_with_config(store: Arc<MockStore>, config: ImportConfig) -> CatalogImporter {
        let icons = IconConfig {
            inline: false,
            timeout_secs: 1,
            max_bytes: 1024,
        };
        CatalogImporter::new(store, config, &icons)
    }

    const SAMPLE_CSV: &str = "\
Brand Name,Strength,Generic Name,Manufacturer,Drug Class,Indication,Image
Napa,500mg,Paracetamol,Beximco,Analgesic,Fever,https://cdn.test/icons/tablet-strip.png
Napa,250mg,Paracetamol,Beximco,Analgesic,Fever,https://cdn.test/icons/tablet-strip.png
Seclo,20mg,Omeprazole,Square,,Acidity,https://cdn.test/icons/capsule.png
";

    #[tokio::test]
    async fn test_end_to_end_import() {
        let store = Arc::new(MockStore::new().with_drug_classes(&[("Analgesic", 900)]));
        let rows = parse_delimited_text(SAMPLE_CSV);

        let result = importer(store.clone()).run(rows).await.unwrap();

        assert!(result.success, "errors: {:?}", result.errors);
        assert_eq!(result.failed, 0);

        // Two strengths of the same brand stay distinct rows.
        let napa_500 = store.medicine_by_slug("napa-500mg").expect("napa-500mg");
        let napa_250 = store.medicine_by_slug("napa-250mg").expect("napa-250mg");
        assert_ne!(napa_500.id, napa_250.id);
        assert_eq!(store.medicine_count(), 3);

        // FKs resolved through the re-read lookups.
        let generics = store.generics.lock().unwrap().clone();
        let paracetamol = generics.iter().find(|g| g.slug == "paracetamol").unwrap();
        assert_eq!(napa_500.generic_id, paracetamol.id);
        assert_eq!(paracetamol.drug_class_id, Some(900));

        let forms = store.dosage_forms.lock().unwrap().clone();
        let strip = forms.iter().find(|f| f.slug == "tablet-strip").unwrap();
        assert_eq!(strip.name, "Tablet Strip");
        assert_eq!(napa_500.dosage_form_id, Some(strip.id));

        // imported counts base entities plus medicines
        // (2 forms + 2 manufacturers + 2 generics + 3 medicines)
        assert_eq!(result.imported, 9);
        assert_eq!(result.updated, 0);
    }

    #[tokio::test]
    async fn test_rerun_updates_in_place() {
        let store = Arc::new(MockStore::new());
        let imp = importer(store.clone());

        let first = imp.run(parse_delimited_text(SAMPLE_CSV)).await.unwrap();
        assert!(first.success);
        let count_after_first = store.medicine_count();

        let second = imp.run(parse_delimited_text(SAMPLE_CSV)).await.unwrap();
        assert!(second.success);
        assert_eq!(store.medicine_count(), count_after_first);
        assert_eq!(second.imported, 0);
        assert_eq!(second.updated, first.imported);
    }

    #[tokio::test]
    async fn test_missing_generic_excludes_row() {
        let store = Arc::new(MockStore::new());
        let csv = "\
Brand Name,Strength,Generic Name,Manufacturer
Napa,500mg,Paracetamol,Beximco
Mystery,10mg,,Beximco
";
        let result = importer(store.clone()).run(parse_delimited_text(csv)).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.failed, 1);
        assert_eq!(store.medicine_count(), 1);
        assert!(store.medicine_by_slug("mystery-10mg").is_none());

        let error = &result.errors[0];
        assert_eq!(error.row, Some(1));
        assert_eq!(error.field.as_deref(), Some("generic name"));
    }

    #[tokio::test]
    async fn test_missing_brand_name_excludes_row() {
        let store = Arc::new(MockStore::new());
        let csv = "\
Brand Name,Strength,Generic Name
,500mg,Paracetamol
Napa,500mg,Paracetamol
";
        let result = importer(store.clone()).run(parse_delimited_text(csv)).await.unwrap();

        assert!(!result.success);
        assert_eq!(store.medicine_count(), 1);
        assert_eq!(result.errors[0].row, Some(0));
        assert_eq!(result.errors[0].field.as_deref(), Some("brand name"));
    }

    #[tokio::test]
    async fn test_duplicate_rows_deduplicated() {
        let store = Arc::new(MockStore::new());
        let csv = "\
Brand Name,Strength,Generic Name
Napa,500mg,Paracetamol
Napa,500mg,Paracetamol
";
        let result = importer(store.clone()).run(parse_delimited_text(csv)).await.unwrap();

        assert!(result.success);
        assert_eq!(store.medicine_count(), 1);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn test_failing_medicine_chunk_continues() {
        let mut mock = MockStore::new();
        mock.failing_medicine_calls = vec![1];
        let store = Arc::new(mock);

        let mut csv = String::from("Brand Name,Strength,Generic Name\n");
        for i in 0..3 {
            csv.push_str(&format!("Brand{i},10mg,Paracetamol\n"));
        }

        let result = importer_with_config(
            store.clone(),
            ImportConfig {
                reference_batch_size: 100,
                medicine_batch_size: 1,
                max_reported_errors: 10,
            },
        )
        .run(parse_delimited_text(&csv))
        .await
        .unwrap();

        // Chunk 2 of 3 failed; chunks 1 and 3 still landed.
        assert!(!result.success);
        assert_eq!(result.imported, 2 + 1); // 2 medicines + 1 generic
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].chunk, Some(1));
        assert_eq!(store.medicine_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_drug_class_leaves_generic_unclassified() {
        let store = Arc::new(MockStore::new().with_drug_classes(&[("Analgesic", 900)]));
        let csv = "\
Brand Name,Strength,Generic Name,Drug Class
Seclo,20mg,Omeprazole,Proton Pump Inhibitor
";
        let result = importer(store.clone()).run(parse_delimited_text(csv)).await.unwrap();
        assert!(result.success);

        let generics = store.generics.lock().unwrap().clone();
        assert_eq!(generics[0].drug_class_id, None);
    }
}
