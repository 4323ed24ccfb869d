use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::display::{progress_color, status_hint};
use super::event::{JobEvent, StartedJob};
use super::Error;

/// Derived from `started_at`/`finished_at`/`failed`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row per job execution attempt, keyed by the externally assigned `job_id`.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobRecord {
    pub job_id: String,
    pub name: String,
    pub connection: String,
    pub queue: String,
    pub attempt: i32,
    pub progress: i32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed: bool,
    pub payload: Option<String>,
    pub exception_message: Option<String>,
}

impl JobRecord {
    pub fn started(job: StartedJob, now: DateTime<Utc>) -> Self {
        JobRecord {
            job_id: job.job_id,
            name: job.name,
            connection: job.connection,
            queue: job.queue,
            attempt: job.attempt,
            progress: 0,
            started_at: now,
            finished_at: None,
            failed: false,
            payload: job.payload,
            exception_message: None,
        }
    }

    pub const fn status(&self) -> JobStatus {
        match (self.finished_at.is_some(), self.failed) {
            (false, _) => JobStatus::Running,
            (true, false) => JobStatus::Success,
            (true, true) => JobStatus::Failed,
        }
    }

    pub fn duration_ms(&self) -> Option<i64> {
        let finished_at = self.finished_at?;
        Some(
            finished_at
                .signed_duration_since(self.started_at)
                .num_milliseconds(),
        )
    }

    /// Last segment of the fully qualified job name, `App\Jobs\Sync` -> `Sync`.
    pub fn short_name(&self) -> &str {
        split_name(&self.name).1
    }

    /// Everything before the last segment, shown as a secondary descriptor.
    pub fn namespace(&self) -> Option<&str> {
        split_name(&self.name).0
    }

    /// State machine step. Terminal records absorb nothing; a repeated
    /// `started` is a duplicate. Progress never goes backwards.
    pub fn apply(&mut self, event: &JobEvent, now: DateTime<Utc>) -> Result<(), Error> {
        if let JobEvent::Started(_) = event {
            return Err(Error::DuplicateStart(self.job_id.clone()));
        }
        if self.finished_at.is_some() {
            return Err(Error::InvalidTransition {
                job_id: self.job_id.clone(),
                status: self.status(),
                kind: event.kind(),
            });
        }
        match event {
            JobEvent::Progress { progress, .. } => {
                self.progress = self.progress.max(*progress);
            }
            JobEvent::Finished { .. } => {
                self.finished_at = Some(now);
                self.failed = false;
                self.progress = 100;
            }
            JobEvent::Failed {
                exception_message, ..
            } => {
                self.finished_at = Some(now);
                self.failed = true;
                self.exception_message = Some(exception_message.clone());
            }
            JobEvent::Started(_) => unreachable!(),
        }
        Ok(())
    }
}

fn split_name(name: &str) -> (Option<&str>, &str) {
    for sep in ["\\", "::"] {
        if let Some((namespace, short)) = name.rsplit_once(sep) {
            return (Some(namespace), short);
        }
    }
    (None, name)
}

impl Serialize for JobRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("JobRecord", 15)?;
        s.serialize_field("job_id", &self.job_id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("short_name", self.short_name())?;
        s.serialize_field("connection", &self.connection)?;
        s.serialize_field("queue", &self.queue)?;
        s.serialize_field("attempt", &self.attempt)?;
        s.serialize_field("status", &self.status())?;
        s.serialize_field("status_hint", &status_hint(self.status()))?;
        s.serialize_field("progress", &self.progress)?;
        s.serialize_field("progress_color", progress_color(self.progress))?;
        s.serialize_field("started_at", &self.started_at)?;
        s.serialize_field("finished_at", &self.finished_at)?;
        s.serialize_field("duration_ms", &self.duration_ms())?;
        s.serialize_field("payload", &self.payload)?;
        s.serialize_field("exception_message", &self.exception_message)?;
        s.end()
    }
}

#[cfg(test)]
fn record(job_id: &str, name: &str) -> JobRecord {
    JobRecord::started(
        StartedJob {
            job_id: job_id.into(),
            name: name.into(),
            connection: "redis".into(),
            queue: "default".into(),
            attempt: 1,
            payload: None,
        },
        Utc::now(),
    )
}

#[tokio::test]
async fn started_record_is_running() -> anyhow::Result<()> {
    // arrange & act
    let record = record("j1", "App\\Jobs\\Sync");

    // assert
    assert_eq!(JobStatus::Running, record.status());
    assert_eq!(0, record.progress);
    assert_eq!(None, record.finished_at);
    assert_eq!(None, record.duration_ms());
    Ok(())
}

#[tokio::test]
async fn progress_then_finished_is_success() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    let job_id = record.job_id.clone();

    // act
    record.apply(
        &JobEvent::Progress {
            job_id: job_id.clone(),
            progress: 50,
        },
        Utc::now(),
    )?;
    record.apply(&JobEvent::Finished { job_id }, Utc::now())?;

    // assert
    assert_eq!(JobStatus::Success, record.status());
    assert_eq!(100, record.progress);
    assert!(record.finished_at.unwrap() >= record.started_at);
    assert!(record.duration_ms().unwrap() >= 0);
    Ok(())
}

#[tokio::test]
async fn failed_keeps_progress_and_records_message() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    let job_id = record.job_id.clone();
    record.apply(
        &JobEvent::Progress {
            job_id: job_id.clone(),
            progress: 40,
        },
        Utc::now(),
    )?;

    // act
    record.apply(
        &JobEvent::Failed {
            job_id,
            exception_message: "boom".into(),
        },
        Utc::now(),
    )?;

    // assert
    assert_eq!(JobStatus::Failed, record.status());
    assert_eq!(40, record.progress);
    assert_eq!(Some("boom".to_owned()), record.exception_message);
    assert!(record.finished_at.unwrap() >= record.started_at);
    Ok(())
}

#[tokio::test]
async fn failed_after_finished_is_rejected_unchanged() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    let job_id = record.job_id.clone();
    record.apply(&JobEvent::Finished { job_id: job_id.clone() }, Utc::now())?;
    let before = record.clone();

    // act
    let res = record.apply(
        &JobEvent::Failed {
            job_id,
            exception_message: "boom".into(),
        },
        Utc::now(),
    );

    // assert
    assert!(matches!(res, Err(Error::InvalidTransition { .. })));
    assert_eq!(before, record);
    assert_eq!(JobStatus::Success, record.status());
    Ok(())
}

#[tokio::test]
async fn finished_after_failed_is_rejected_unchanged() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    let job_id = record.job_id.clone();
    record.apply(
        &JobEvent::Failed {
            job_id: job_id.clone(),
            exception_message: "boom".into(),
        },
        Utc::now(),
    )?;
    let before = record.clone();

    // act
    let res = record.apply(&JobEvent::Finished { job_id }, Utc::now());

    // assert
    assert!(matches!(res, Err(Error::InvalidTransition { .. })));
    assert_eq!(before, record);
    assert_eq!(JobStatus::Failed, record.status());
    Ok(())
}

#[tokio::test]
async fn progress_after_terminal_is_rejected() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    let job_id = record.job_id.clone();
    record.apply(&JobEvent::Finished { job_id: job_id.clone() }, Utc::now())?;

    // act
    let res = record.apply(&JobEvent::Progress { job_id, progress: 10 }, Utc::now());

    // assert
    assert!(matches!(res, Err(Error::InvalidTransition { .. })));
    assert_eq!(100, record.progress);
    Ok(())
}

#[tokio::test]
async fn progress_never_decreases() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    let job_id = record.job_id.clone();

    // act
    record.apply(
        &JobEvent::Progress {
            job_id: job_id.clone(),
            progress: 50,
        },
        Utc::now(),
    )?;
    record.apply(&JobEvent::Progress { job_id, progress: 30 }, Utc::now())?;

    // assert
    assert_eq!(50, record.progress);
    Ok(())
}

#[tokio::test]
async fn repeated_started_is_duplicate() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");

    // act
    let res = record.apply(
        &JobEvent::Started(StartedJob {
            job_id: "j1".into(),
            name: "App\\Jobs\\Sync".into(),
            connection: "redis".into(),
            queue: "default".into(),
            attempt: 1,
            payload: None,
        }),
        Utc::now(),
    );

    // assert
    assert!(matches!(res, Err(Error::DuplicateStart(_))));
    Ok(())
}

#[tokio::test]
async fn short_name_and_namespace() -> anyhow::Result<()> {
    // arrange
    let backslash = record("j1", "App\\Jobs\\Sync");
    let path = record("j2", "app::jobs::Sync");
    let plain = record("j3", "Sync");

    // act & assert
    assert_eq!("Sync", backslash.short_name());
    assert_eq!(Some("App\\Jobs"), backslash.namespace());
    assert_eq!("Sync", path.short_name());
    assert_eq!(Some("app::jobs"), path.namespace());
    assert_eq!("Sync", plain.short_name());
    assert_eq!(None, plain.namespace());
    Ok(())
}

#[tokio::test]
async fn serialized_record_carries_derived_fields() -> anyhow::Result<()> {
    // arrange
    let mut record = record("j1", "App\\Jobs\\Sync");
    record.apply(&JobEvent::Finished { job_id: "j1".into() }, Utc::now())?;

    // act
    let json = serde_json::to_value(&record)?;

    // assert
    assert_eq!("success", json["status"]);
    assert_eq!("success", json["status_hint"]["color"]);
    assert_eq!("success", json["progress_color"]);
    assert_eq!("Sync", json["short_name"]);
    assert!(json["duration_ms"].is_i64());
    Ok(())
}
