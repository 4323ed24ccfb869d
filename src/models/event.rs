use serde::Deserialize;

/// Wire form of a worker lifecycle event, as submitted to the API.
///
/// `connection` may be omitted; the ingestor fills in the configured default.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngestEvent {
    Started {
        job_id: String,
        name: String,
        connection: Option<String>,
        queue: String,
        attempt: i32,
        payload: Option<String>,
    },
    Progress {
        job_id: String,
        progress: i32,
    },
    Finished {
        job_id: String,
    },
    Failed {
        job_id: String,
        exception_message: Option<String>,
    },
}

impl IngestEvent {
    pub fn job_id(&self) -> &str {
        match self {
            IngestEvent::Started { job_id, .. }
            | IngestEvent::Progress { job_id, .. }
            | IngestEvent::Finished { job_id }
            | IngestEvent::Failed { job_id, .. } => job_id,
        }
    }
}

/// Validated and normalized event, the only input the store accepts.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Started(StartedJob),
    Progress { job_id: String, progress: i32 },
    Finished { job_id: String },
    Failed { job_id: String, exception_message: String },
}

#[derive(Debug, Clone)]
pub struct StartedJob {
    pub job_id: String,
    pub name: String,
    pub connection: String,
    pub queue: String,
    pub attempt: i32,
    pub payload: Option<String>,
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Started(job) => &job.job_id,
            JobEvent::Progress { job_id, .. }
            | JobEvent::Finished { job_id }
            | JobEvent::Failed { job_id, .. } => job_id,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            JobEvent::Started(_) => "started",
            JobEvent::Progress { .. } => "progress",
            JobEvent::Finished { .. } => "finished",
            JobEvent::Failed { .. } => "failed",
        }
    }
}
