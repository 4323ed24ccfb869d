use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    StartedAt,
    Name,
    Progress,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub const fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// Predicates for a dashboard listing. All are conjunctive; `None` matches everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanFilter {
    pub connection: Option<String>,
    pub queue: Option<String>,
    pub status: Option<JobStatus>,
    pub name_contains: Option<String>,
    pub started_after: Option<DateTime<Utc>>,
    pub started_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PagingResult<T> {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
    pub data: Vec<T>,
}

#[tokio::test]
async fn sort_defaults_to_started_at_desc() -> anyhow::Result<()> {
    // arrange & act
    let field = SortField::default();
    let dir = SortDir::default();

    // assert
    assert_eq!(SortField::StartedAt, field);
    assert_eq!(SortDir::Desc, dir);
    assert_eq!("desc", dir.as_sql());
    Ok(())
}

#[tokio::test]
async fn sort_field_parses_from_snake_case() -> anyhow::Result<()> {
    // arrange
    let raw = "\"started_at\"";

    // act
    let field: SortField = serde_json::from_str(raw)?;

    // assert
    assert_eq!(SortField::StartedAt, field);
    Ok(())
}
