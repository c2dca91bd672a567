//! Catalog store access
//!
//! `CatalogStore` is the import pipeline's only boundary with the external
//! relational store: batched upserts keyed on the slug natural key, and full
//! table reads used to rebuild lookup maps between pipeline stages. The
//! Postgres implementation bulk-inserts each batch through `UNNEST` arrays so
//! a batch is a single round trip, and uses `RETURNING (xmax = 0)` to count
//! inserted vs. updated rows.
//!
//! Note: the list reads return the whole table. Catalog tables are small
//! (hundreds to low thousands of rows); there is no pagination here.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

/// Outcome of one batched upsert call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Rows that did not exist before this call
    pub inserted: u64,
    /// Rows updated in place via the conflict key
    pub updated: u64,
}

impl UpsertStats {
    /// Total rows affected
    pub fn affected(&self) -> u64 {
        self.inserted + self.updated
    }

    /// Merge stats from another batch
    pub fn merge(&mut self, other: UpsertStats) {
        self.inserted += other.inserted;
        self.updated += other.updated;
    }
}

/// Data-access boundary for the catalog import pipeline
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn upsert_dosage_forms(&self, rows: &[NewDosageForm]) -> Result<UpsertStats>;
    async fn upsert_manufacturers(&self, rows: &[NewManufacturer]) -> Result<UpsertStats>;
    async fn upsert_generics(&self, rows: &[NewGeneric]) -> Result<UpsertStats>;
    async fn upsert_medicines(&self, rows: &[NewMedicine]) -> Result<UpsertStats>;

    async fn list_dosage_forms(&self) -> Result<Vec<DosageForm>>;
    async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>>;
    async fn list_generics(&self) -> Result<Vec<Generic>>;
    async fn list_drug_classes(&self) -> Result<Vec<DrugClass>>;
}

/// Postgres-backed catalog store
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: DbPool,
}

impl PgCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Fold `RETURNING (xmax = 0)` rows into insert/update counts
    fn fold_stats(flags: Vec<bool>) -> UpsertStats {
        let inserted = flags.iter().filter(|&&f| f).count() as u64;
        let updated = flags.len() as u64 - inserted;
        UpsertStats { inserted, updated }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn upsert_dosage_forms(&self, rows: &[NewDosageForm]) -> Result<UpsertStats> {
        if rows.is_empty() {
            return Ok(UpsertStats::default());
        }

        let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
        let slugs: Vec<String> = rows.iter().map(|r| r.slug.clone()).collect();
        let icons: Vec<Option<String>> = rows.iter().map(|r| r.icon_url.clone()).collect();

        let flags = sqlx::query(
            r#"
            INSERT INTO dosage_forms (name, slug, icon_url)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::text[])
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                icon_url = EXCLUDED.icon_url,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&names)
        .bind(&slugs)
        .bind(&icons)
        .fetch_all(self.pool.write())
        .await?
        .into_iter()
        .map(|row| row.get::<bool, _>("inserted"))
        .collect();

        let stats = Self::fold_stats(flags);
        debug!(table = "dosage_forms", inserted = stats.inserted, updated = stats.updated, "Batch upserted");
        Ok(stats)
    }

    async fn upsert_manufacturers(&self, rows: &[NewManufacturer]) -> Result<UpsertStats> {
        if rows.is_empty() {
            return Ok(UpsertStats::default());
        }

        let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
        let slugs: Vec<String> = rows.iter().map(|r| r.slug.clone()).collect();

        let flags = sqlx::query(
            r#"
            INSERT INTO manufacturers (name, slug)
            SELECT * FROM UNNEST($1::text[], $2::text[])
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&names)
        .bind(&slugs)
        .fetch_all(self.pool.write())
        .await?
        .into_iter()
        .map(|row| row.get::<bool, _>("inserted"))
        .collect();

        let stats = Self::fold_stats(flags);
        debug!(table = "manufacturers", inserted = stats.inserted, updated = stats.updated, "Batch upserted");
        Ok(stats)
    }

    async fn upsert_generics(&self, rows: &[NewGeneric]) -> Result<UpsertStats> {
        if rows.is_empty() {
            return Ok(UpsertStats::default());
        }

        let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
        let slugs: Vec<String> = rows.iter().map(|r| r.slug.clone()).collect();
        let classes: Vec<Option<i64>> = rows.iter().map(|r| r.drug_class_id).collect();
        let indications: Vec<Option<String>> = rows.iter().map(|r| r.indication.clone()).collect();

        let flags = sqlx::query(
            r#"
            INSERT INTO generics (name, slug, drug_class_id, indication)
            SELECT * FROM UNNEST($1::text[], $2::text[], $3::int8[], $4::text[])
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                drug_class_id = EXCLUDED.drug_class_id,
                indication = EXCLUDED.indication,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&names)
        .bind(&slugs)
        .bind(&classes)
        .bind(&indications)
        .fetch_all(self.pool.write())
        .await?
        .into_iter()
        .map(|row| row.get::<bool, _>("inserted"))
        .collect();

        let stats = Self::fold_stats(flags);
        debug!(table = "generics", inserted = stats.inserted, updated = stats.updated, "Batch upserted");
        Ok(stats)
    }

    async fn upsert_medicines(&self, rows: &[NewMedicine]) -> Result<UpsertStats> {
        if rows.is_empty() {
            return Ok(UpsertStats::default());
        }

        let brands: Vec<String> = rows.iter().map(|r| r.brand_name.clone()).collect();
        let strengths: Vec<String> = rows.iter().map(|r| r.strength.clone()).collect();
        let slugs: Vec<String> = rows.iter().map(|r| r.slug.clone()).collect();
        let generics: Vec<i64> = rows.iter().map(|r| r.generic_id).collect();
        let manufacturers: Vec<Option<i64>> = rows.iter().map(|r| r.manufacturer_id).collect();
        let forms: Vec<Option<i64>> = rows.iter().map(|r| r.dosage_form_id).collect();
        let icons: Vec<Option<String>> = rows.iter().map(|r| r.icon_url.clone()).collect();

        let flags = sqlx::query(
            r#"
            INSERT INTO medicines
                (brand_name, strength, slug, generic_id, manufacturer_id, dosage_form_id, icon_url)
            SELECT * FROM UNNEST(
                $1::text[], $2::text[], $3::text[], $4::int8[], $5::int8[], $6::int8[], $7::text[]
            )
            ON CONFLICT (slug) DO UPDATE SET
                brand_name = EXCLUDED.brand_name,
                strength = EXCLUDED.strength,
                generic_id = EXCLUDED.generic_id,
                manufacturer_id = EXCLUDED.manufacturer_id,
                dosage_form_id = EXCLUDED.dosage_form_id,
                icon_url = EXCLUDED.icon_url,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&brands)
        .bind(&strengths)
        .bind(&slugs)
        .bind(&generics)
        .bind(&manufacturers)
        .bind(&forms)
        .bind(&icons)
        .fetch_all(self.pool.write())
        .await?
        .into_iter()
        .map(|row| row.get::<bool, _>("inserted"))
        .collect();

        let stats = Self::fold_stats(flags);
        debug!(table = "medicines", inserted = stats.inserted, updated = stats.updated, "Batch upserted");
        Ok(stats)
    }

    async fn list_dosage_forms(&self) -> Result<Vec<DosageForm>> {
        sqlx::query_as::<_, DosageForm>("SELECT id, name, slug, icon_url FROM dosage_forms")
            .fetch_all(self.pool.read())
            .await
            .map_err(Into::into)
    }

    async fn list_manufacturers(&self) -> Result<Vec<Manufacturer>> {
        sqlx::query_as::<_, Manufacturer>("SELECT id, name, slug FROM manufacturers")
            .fetch_all(self.pool.read())
            .await
            .map_err(Into::into)
    }

    async fn list_generics(&self) -> Result<Vec<Generic>> {
        sqlx::query_as::<_, Generic>(
            "SELECT id, name, slug, drug_class_id, indication FROM generics",
        )
        .fetch_all(self.pool.read())
        .await
        .map_err(Into::into)
    }

    async fn list_drug_classes(&self) -> Result<Vec<DrugClass>> {
        sqlx::query_as::<_, DrugClass>("SELECT id, name, slug FROM drug_classes")
            .fetch_all(self.pool.read())
            .await
            .map_err(Into::into)
    }
}
