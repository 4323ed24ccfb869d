use crate::models::{Error, JobRecord, JobStatus, ScanFilter, SortDir, SortField};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

const COLUMNS: &str = "job_id, name, connection, queue, attempt, progress, started_at, finished_at, failed, payload, exception_message";

/// Returns false when the `job_id` is already known (duplicate start).
pub async fn insert(pool: &Pool<Postgres>, record: &JobRecord) -> Result<bool, Error> {
    const SQL: &str = "INSERT INTO job_records (job_id, name, connection, queue, attempt, progress, started_at, finished_at, failed, payload, exception_message)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (job_id) DO NOTHING";
    let res = sqlx::query(SQL)
        .bind(&record.job_id)
        .bind(&record.name)
        .bind(&record.connection)
        .bind(&record.queue)
        .bind(record.attempt)
        .bind(record.progress)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(record.failed)
        .bind(&record.payload)
        .bind(&record.exception_message)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

/// Row lock serializes concurrent events for the same `job_id`.
pub async fn get_for_update(
    conn: &mut PgConnection,
    job_id: &str,
) -> Result<Option<JobRecord>, Error> {
    const SQL: &str = "SELECT * FROM job_records WHERE job_id = $1 FOR UPDATE";
    let record = sqlx::query_as::<_, JobRecord>(SQL)
        .bind(job_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(record)
}

pub async fn update(conn: &mut PgConnection, record: &JobRecord) -> Result<u64, Error> {
    const SQL: &str = "UPDATE job_records SET progress = $2, finished_at = $3, failed = $4, exception_message = $5 WHERE job_id = $1";
    let res = sqlx::query(SQL)
        .bind(&record.job_id)
        .bind(record.progress)
        .bind(record.finished_at)
        .bind(record.failed)
        .bind(&record.exception_message)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

pub async fn get_by_id(pool: &Pool<Postgres>, job_id: &str) -> Result<Option<JobRecord>, Error> {
    const SQL: &str = "SELECT * FROM job_records WHERE job_id = $1";
    let record = sqlx::query_as::<_, JobRecord>(SQL)
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
    Ok(record)
}

pub async fn scan(
    pool: &Pool<Postgres>,
    filter: &ScanFilter,
    field: SortField,
    dir: SortDir,
    limit: i64,
    offset: i64,
) -> Result<Vec<JobRecord>, Error> {
    let mut qb = build_scan(filter, field, dir, limit, offset);
    let records = qb.build_query_as::<JobRecord>().fetch_all(pool).await?;
    Ok(records)
}

pub async fn count(pool: &Pool<Postgres>, filter: Option<&ScanFilter>) -> Result<i64, Error> {
    let mut qb = build_count(filter);
    let total = qb.build_query_scalar::<i64>().fetch_one(pool).await?;
    Ok(total)
}

// Both sweep deletes select on finished_at IS NOT NULL, so running records
// never match regardless of age.
const SWEEP_EXPIRED_SQL: &str = "DELETE FROM job_records WHERE job_id IN (
    SELECT job_id FROM job_records WHERE finished_at IS NOT NULL AND finished_at < $1
    ORDER BY finished_at LIMIT $2)";
const SWEEP_OVERFLOW_SQL: &str = "DELETE FROM job_records WHERE job_id IN (
    SELECT job_id FROM job_records WHERE finished_at IS NOT NULL
    ORDER BY finished_at LIMIT $1)";

/// Horizon sweep, one bounded batch.
pub async fn delete_finished_before(
    pool: &Pool<Postgres>,
    cutoff: DateTime<Utc>,
    batch: i64,
) -> Result<u64, Error> {
    let res = sqlx::query(SWEEP_EXPIRED_SQL)
        .bind(cutoff)
        .bind(batch)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}

/// Count-cap eviction, oldest finished first.
pub async fn delete_oldest_finished(pool: &Pool<Postgres>, batch: i64) -> Result<u64, Error> {
    let res = sqlx::query(SWEEP_OVERFLOW_SQL).bind(batch).execute(pool).await?;
    Ok(res.rows_affected())
}

fn build_scan<'a>(
    filter: &'a ScanFilter,
    field: SortField,
    dir: SortDir,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM job_records"));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY ");
    qb.push(order_by(field, dir));
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    qb
}

fn build_count<'a>(filter: Option<&'a ScanFilter>) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("SELECT count(*) FROM job_records");
    if let Some(filter) = filter {
        push_filter(&mut qb, filter);
    }
    qb
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ScanFilter) {
    qb.push(" WHERE true");
    if let Some(connection) = &filter.connection {
        qb.push(" AND connection = ").push_bind(connection.as_str());
    }
    if let Some(queue) = &filter.queue {
        qb.push(" AND queue = ").push_bind(queue.as_str());
    }
    if let Some(status) = filter.status {
        qb.push(match status {
            JobStatus::Running => " AND finished_at IS NULL",
            JobStatus::Success => " AND finished_at IS NOT NULL AND NOT failed",
            JobStatus::Failed => " AND finished_at IS NOT NULL AND failed",
        });
    }
    if let Some(name) = &filter.name_contains {
        qb.push(" AND position(").push_bind(name.as_str()).push(" in name) > 0");
    }
    if let Some(after) = filter.started_after {
        qb.push(" AND started_at >= ").push_bind(after);
    }
    if let Some(before) = filter.started_before {
        qb.push(" AND started_at <= ").push_bind(before);
    }
}

// `job_id` tiebreak keeps page boundaries stable under equal sort keys.
fn order_by(field: SortField, dir: SortDir) -> String {
    let dir = dir.as_sql();
    match field {
        SortField::StartedAt => format!("started_at {dir}, job_id asc"),
        SortField::Name => format!("name {dir}, job_id asc"),
        SortField::Progress => format!("progress {dir}, job_id asc"),
        SortField::Status => format!("failed {dir}, finished_at {dir}, job_id asc"),
    }
}

#[tokio::test]
async fn build_scan_defaults_to_newest_first() -> anyhow::Result<()> {
    // arrange
    let filter = ScanFilter::default();

    // act
    let sql = build_scan(&filter, SortField::default(), SortDir::default(), 100, 0).into_sql();

    // assert
    assert!(sql.starts_with("SELECT job_id,"));
    assert!(sql.contains(" ORDER BY started_at desc, job_id asc"));
    assert!(sql.contains(" LIMIT $1 OFFSET $2"));
    assert!(!sql.contains(" AND "));
    Ok(())
}

#[tokio::test]
async fn build_scan_binds_every_filter() -> anyhow::Result<()> {
    // arrange
    let filter = ScanFilter {
        connection: Some("redis".into()),
        queue: Some("default".into()),
        status: Some(JobStatus::Failed),
        name_contains: Some("Sync".into()),
        started_after: Some(Utc::now()),
        started_before: Some(Utc::now()),
    };

    // act
    let sql = build_scan(&filter, SortField::StartedAt, SortDir::Desc, 10, 0).into_sql();

    // assert
    assert!(sql.contains(" AND connection = $1"));
    assert!(sql.contains(" AND queue = $2"));
    assert!(sql.contains(" AND finished_at IS NOT NULL AND failed"));
    assert!(sql.contains(" AND position($3 in name) > 0"));
    assert!(sql.contains(" AND started_at >= $4"));
    assert!(sql.contains(" AND started_at <= $5"));
    assert!(sql.contains(" LIMIT $6 OFFSET $7"));
    Ok(())
}

#[tokio::test]
async fn build_scan_status_predicates_derive_from_columns() -> anyhow::Result<()> {
    // arrange
    let running = ScanFilter {
        status: Some(JobStatus::Running),
        ..Default::default()
    };
    let success = ScanFilter {
        status: Some(JobStatus::Success),
        ..Default::default()
    };

    // act
    let running_sql = build_scan(&running, SortField::StartedAt, SortDir::Desc, 10, 0).into_sql();
    let success_sql = build_scan(&success, SortField::StartedAt, SortDir::Desc, 10, 0).into_sql();

    // assert
    assert!(running_sql.contains(" AND finished_at IS NULL"));
    assert!(success_sql.contains(" AND finished_at IS NOT NULL AND NOT failed"));
    Ok(())
}

#[tokio::test]
async fn build_scan_status_sort_uses_failed_then_finished_at() -> anyhow::Result<()> {
    // arrange
    let filter = ScanFilter::default();

    // act
    let sql = build_scan(&filter, SortField::Status, SortDir::Desc, 10, 0).into_sql();

    // assert
    assert!(sql.contains(" ORDER BY failed desc, finished_at desc, job_id asc"));
    Ok(())
}

#[tokio::test]
async fn sweep_deletes_only_finished_records() -> anyhow::Result<()> {
    // act & assert
    for sql in [SWEEP_EXPIRED_SQL, SWEEP_OVERFLOW_SQL] {
        assert!(sql.contains("WHERE finished_at IS NOT NULL"));
        assert!(sql.contains("ORDER BY finished_at LIMIT"));
    }
    Ok(())
}

#[tokio::test]
async fn build_count_with_and_without_filter() -> anyhow::Result<()> {
    // arrange
    let filter = ScanFilter {
        queue: Some("default".into()),
        ..Default::default()
    };

    // act
    let unfiltered = build_count(None).into_sql();
    let filtered = build_count(Some(&filter)).into_sql();

    // assert
    assert_eq!("SELECT count(*) FROM job_records", unfiltered);
    assert!(filtered.contains(" WHERE true AND queue = $1"));
    Ok(())
}
