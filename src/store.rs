use async_channel::Sender;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use tokio_util::sync::CancellationToken;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

use crate::db;
use crate::models::{
    Error, JobEvent, JobRecord, ScanFilter, SortDir, SortField, SweeperOptions,
};

/// Durable record store. One transaction per accepted event; the row lock
/// taken by `SELECT .. FOR UPDATE` serializes writers per `job_id` while
/// events for distinct jobs proceed in parallel.
#[derive(Debug, Clone)]
pub struct JobRecordStore {
    pool: Pool<Postgres>,
    notify_tx: Option<Sender<JobRecord>>,
}

impl JobRecordStore {
    pub fn new(pool: Pool<Postgres>, notify_tx: Option<Sender<JobRecord>>) -> Self {
        Self { pool, notify_tx }
    }

    pub async fn apply(&self, event: JobEvent) -> Result<JobRecord, Error> {
        match event {
            JobEvent::Started(started) => {
                let record = JobRecord::started(started, Utc::now());
                let inserted = db::records::insert(&self.pool, &record).await?;
                if !inserted {
                    return Err(Error::DuplicateStart(record.job_id));
                }
                debug!({ job_id = record.job_id }, "==> started");
                Ok(record)
            }
            event => {
                let mut tx = self.pool.begin().await?;
                let mut record = db::records::get_for_update(&mut tx, event.job_id())
                    .await?
                    .ok_or_else(|| Error::JobNotFound(event.job_id().to_owned()))?;
                record.apply(&event, Utc::now())?;
                db::records::update(&mut tx, &record).await?;
                tx.commit().await?;
                debug!({ job_id = record.job_id, kind = event.kind() }, "==> applied");
                if matches!(event, JobEvent::Failed { .. }) {
                    self.notify_failed(&record);
                }
                Ok(record)
            }
        }
    }

    // Best effort, never blocks the write path and never fails the transition.
    fn notify_failed(&self, record: &JobRecord) {
        let Some(tx) = &self.notify_tx else {
            return;
        };
        if let Err(err) = tx.try_send(record.clone()) {
            warn!({ job_id = record.job_id }, "notify queue send error {}", err);
        }
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<JobRecord>, Error> {
        db::records::get_by_id(&self.pool, job_id).await
    }

    pub async fn scan(
        &self,
        filter: &ScanFilter,
        field: SortField,
        dir: SortDir,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRecord>, Error> {
        db::records::scan(&self.pool, filter, field, dir, limit, offset).await
    }

    pub async fn count(&self, filter: Option<&ScanFilter>) -> Result<i64, Error> {
        db::records::count(&self.pool, filter).await
    }

    /// One retention pass: horizon expiry first, then count-cap eviction,
    /// all in bounded batches. Cancellable between batches.
    pub async fn sweep(
        &self,
        options: &SweeperOptions,
        token: &CancellationToken,
    ) -> Result<u64, Error> {
        let cutoff = Utc::now() - chrono::Duration::days(options.horizon_days);
        let mut deleted: u64 = 0;
        while !token.is_cancelled() {
            let n =
                db::records::delete_finished_before(&self.pool, cutoff, options.batch_size).await?;
            deleted += n;
            if n < options.batch_size as u64 {
                break;
            }
        }
        while !token.is_cancelled() {
            let total = db::records::count(&self.pool, None).await?;
            let excess = total - options.max_records;
            if excess <= 0 {
                break;
            }
            let n = db::records::delete_oldest_finished(
                &self.pool,
                excess.min(options.batch_size),
            )
            .await?;
            deleted += n;
            if n == 0 {
                // everything left over the cap is still running
                break;
            }
        }
        Ok(deleted)
    }
}
