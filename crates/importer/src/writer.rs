//! Batched writer
//!
//! Persists deduplicated, resolved records in bounded-size chunks, one store
//! call per chunk, awaited sequentially. A failed chunk is recorded as a
//! single diagnostic and never stops the chunks after it.

use crate::report::{ImportError, ImportReport};
use rxcatalog_common::errors::Result;
use rxcatalog_common::UpsertStats;
use std::future::Future;
use tracing::{debug, warn};

/// Upsert `rows` in consecutive chunks of `batch_size`.
///
/// `op` issues one upsert call for a chunk and reports how many rows were
/// inserted vs. updated. On a chunk failure one [`ImportError`] naming the
/// chunk (not each row within it) is recorded and processing continues with
/// the next chunk.
pub async fn upsert_in_batches<T, F, Fut>(
    rows: Vec<T>,
    batch_size: usize,
    mut op: F,
) -> ImportReport
where
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<UpsertStats>>,
{
    let mut report = ImportReport::new();
    let batch_size = batch_size.max(1);
    let total = rows.len();

    let mut iter = rows.into_iter();
    let mut chunk_index = 0;
    loop {
        let batch: Vec<T> = iter.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }
        let rows_in_chunk = batch.len() as u64;

        match op(batch).await {
            Ok(stats) => {
                debug!(
                    chunk = chunk_index,
                    inserted = stats.inserted,
                    updated = stats.updated,
                    "Chunk upserted"
                );
                report.record_written(stats.inserted, stats.updated);
            }
            Err(e) => {
                warn!(chunk = chunk_index, error = %e, "Chunk upsert failed, continuing");
                report.record_chunk_error(
                    ImportError::chunk(chunk_index, e.to_string()),
                    rows_in_chunk,
                );
            }
        }

        chunk_index += 1;
    }

    debug!(
        total,
        chunks = chunk_index,
        imported = report.imported,
        updated = report.updated,
        failed = report.failed,
        "Batched write complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rxcatalog_common::errors::AppError;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_all_chunks_succeed() {
        let rows: Vec<i32> = (0..250).collect();
        let report = upsert_in_batches(rows, 100, |batch| async move {
            Ok(UpsertStats {
                inserted: batch.len() as u64,
                updated: 0,
            })
        })
        .await;

        assert_eq!(report.imported, 250);
        assert_eq!(report.failed, 0);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_failing_middle_chunk_does_not_abort() {
        let rows: Vec<i32> = (0..300).collect();
        let calls = Cell::new(0usize);

        let report = upsert_in_batches(rows, 100, |batch| {
            let call = calls.get();
            calls.set(call + 1);
            async move {
                if call == 1 {
                    Err(AppError::Internal {
                        message: "simulated store failure".into(),
                    })
                } else {
                    Ok(UpsertStats {
                        inserted: batch.len() as u64,
                        updated: 0,
                    })
                }
            }
        })
        .await;

        // Chunks 1 and 3 land; chunk 2 is one error covering its 100 rows.
        assert_eq!(report.imported, 200);
        assert_eq!(report.failed, 100);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].chunk, Some(1));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_chunk_sizes_are_consecutive() {
        let rows: Vec<i32> = (0..5).collect();
        let sizes = std::cell::RefCell::new(Vec::new());

        upsert_in_batches(rows, 2, |batch| {
            sizes.borrow_mut().push(batch.clone());
            async move {
                Ok(UpsertStats {
                    inserted: batch.len() as u64,
                    updated: 0,
                })
            }
        })
        .await;

        assert_eq!(
            *sizes.borrow(),
            vec![vec![0, 1], vec![2, 3], vec![4]]
        );
    }

    #[tokio::test]
    async fn test_empty_input() {
        let calls = Cell::new(0usize);
        let report = upsert_in_batches(Vec::<i32>::new(), 100, |_batch| {
            calls.set(calls.get() + 1);
            async move { Ok(UpsertStats::default()) }
        })
        .await;
        assert_eq!(calls.get(), 0);
        assert_eq!(report.imported, 0);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_updates_counted_separately() {
        let rows: Vec<i32> = (0..10).collect();
        let report = upsert_in_batches(rows, 10, |batch| async move {
            Ok(UpsertStats {
                inserted: 4,
                updated: batch.len() as u64 - 4,
            })
        })
        .await;
        assert_eq!(report.imported, 4);
        assert_eq!(report.updated, 6);
    }
}
