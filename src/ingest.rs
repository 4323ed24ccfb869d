use crate::models::{Error, IngestEvent, JobEvent, JobRecord, StartedJob};
use crate::store::JobRecordStore;

/// Stateless validator in front of the store. Holds the injected defaults,
/// rejects malformed events before any mutation happens.
#[derive(Debug, Clone)]
pub struct EventIngestor {
    default_connection: String,
    max_payload_bytes: usize,
}

impl EventIngestor {
    pub fn new(default_connection: impl Into<String>, max_payload_bytes: usize) -> Self {
        Self {
            default_connection: default_connection.into(),
            max_payload_bytes,
        }
    }

    pub async fn ingest(
        &self,
        store: &JobRecordStore,
        event: IngestEvent,
    ) -> Result<JobRecord, Error> {
        let event = self.normalize(event)?;
        store.apply(event).await
    }

    pub fn normalize(&self, event: IngestEvent) -> Result<JobEvent, Error> {
        if event.job_id().trim().is_empty() {
            return Err(Error::InvalidParams("job_id"));
        }
        match event {
            IngestEvent::Started {
                job_id,
                name,
                connection,
                queue,
                attempt,
                payload,
            } => {
                if name.trim().is_empty() {
                    return Err(Error::InvalidParams("name"));
                }
                if queue.trim().is_empty() {
                    return Err(Error::InvalidParams("queue"));
                }
                if attempt < 1 {
                    return Err(Error::InvalidParams("attempt"));
                }
                if payload.as_ref().is_some_and(|p| p.len() > self.max_payload_bytes) {
                    return Err(Error::InvalidParams("payload"));
                }
                let connection = connection
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| self.default_connection.clone());
                Ok(JobEvent::Started(StartedJob {
                    job_id,
                    name,
                    connection,
                    queue,
                    attempt,
                    payload,
                }))
            }
            IngestEvent::Progress { job_id, progress } => {
                if !(0..=100).contains(&progress) {
                    return Err(Error::InvalidParams("progress"));
                }
                Ok(JobEvent::Progress { job_id, progress })
            }
            IngestEvent::Finished { job_id } => Ok(JobEvent::Finished { job_id }),
            IngestEvent::Failed {
                job_id,
                exception_message,
            } => {
                let exception_message = exception_message
                    .filter(|m| !m.trim().is_empty())
                    .ok_or(Error::InvalidParams("exception_message"))?;
                Ok(JobEvent::Failed {
                    job_id,
                    exception_message,
                })
            }
        }
    }
}

#[cfg(test)]
fn ingestor() -> EventIngestor {
    EventIngestor::new("redis", 1024)
}

#[cfg(test)]
fn started(connection: Option<&str>) -> IngestEvent {
    IngestEvent::Started {
        job_id: "j1".into(),
        name: "App\\Jobs\\Sync".into(),
        connection: connection.map(Into::into),
        queue: "default".into(),
        attempt: 1,
        payload: None,
    }
}

#[tokio::test]
async fn normalize_fills_default_connection() -> anyhow::Result<()> {
    // arrange
    let ingestor = ingestor();

    // act
    let missing = ingestor.normalize(started(None))?;
    let blank = ingestor.normalize(started(Some("  ")))?;
    let explicit = ingestor.normalize(started(Some("database")))?;

    // assert
    for (event, expected) in [(missing, "redis"), (blank, "redis"), (explicit, "database")] {
        match event {
            JobEvent::Started(job) => assert_eq!(expected, job.connection),
            other => anyhow::bail!("expected started, got {}", other.kind()),
        }
    }
    Ok(())
}

#[tokio::test]
async fn normalize_rejects_blank_required_fields() -> anyhow::Result<()> {
    // arrange
    let ingestor = ingestor();
    let blank_id = IngestEvent::Finished { job_id: " ".into() };
    let blank_name = IngestEvent::Started {
        job_id: "j1".into(),
        name: "".into(),
        connection: None,
        queue: "default".into(),
        attempt: 1,
        payload: None,
    };

    // act & assert
    assert!(matches!(
        ingestor.normalize(blank_id),
        Err(Error::InvalidParams("job_id"))
    ));
    assert!(matches!(
        ingestor.normalize(blank_name),
        Err(Error::InvalidParams("name"))
    ));
    Ok(())
}

#[tokio::test]
async fn normalize_rejects_bad_attempt_and_progress() -> anyhow::Result<()> {
    // arrange
    let ingestor = ingestor();
    let zero_attempt = IngestEvent::Started {
        job_id: "j1".into(),
        name: "App\\Jobs\\Sync".into(),
        connection: None,
        queue: "default".into(),
        attempt: 0,
        payload: None,
    };
    let over = IngestEvent::Progress {
        job_id: "j1".into(),
        progress: 101,
    };
    let under = IngestEvent::Progress {
        job_id: "j1".into(),
        progress: -1,
    };

    // act & assert
    assert!(matches!(
        ingestor.normalize(zero_attempt),
        Err(Error::InvalidParams("attempt"))
    ));
    assert!(matches!(
        ingestor.normalize(over),
        Err(Error::InvalidParams("progress"))
    ));
    assert!(matches!(
        ingestor.normalize(under),
        Err(Error::InvalidParams("progress"))
    ));
    Ok(())
}

#[tokio::test]
async fn normalize_bounds_payload_size() -> anyhow::Result<()> {
    // arrange
    let ingestor = ingestor();
    let oversized = IngestEvent::Started {
        job_id: "j1".into(),
        name: "App\\Jobs\\Sync".into(),
        connection: None,
        queue: "default".into(),
        attempt: 1,
        payload: Some("x".repeat(1025)),
    };

    // act & assert
    assert!(matches!(
        ingestor.normalize(oversized),
        Err(Error::InvalidParams("payload"))
    ));
    Ok(())
}

#[tokio::test]
async fn normalize_requires_exception_message_on_failed() -> anyhow::Result<()> {
    // arrange
    let ingestor = ingestor();
    let missing = IngestEvent::Failed {
        job_id: "j1".into(),
        exception_message: None,
    };
    let blank = IngestEvent::Failed {
        job_id: "j1".into(),
        exception_message: Some("  ".into()),
    };

    // act & assert
    assert!(matches!(
        ingestor.normalize(missing),
        Err(Error::InvalidParams("exception_message"))
    ));
    assert!(matches!(
        ingestor.normalize(blank),
        Err(Error::InvalidParams("exception_message"))
    ));
    Ok(())
}

#[tokio::test]
async fn event_kind_parses_from_tagged_json() -> anyhow::Result<()> {
    // arrange
    let raw = r#"{"kind":"progress","job_id":"j1","progress":50}"#;

    // act
    let event: IngestEvent = serde_json::from_str(raw)?;
    let event = ingestor().normalize(event)?;

    // assert
    assert_eq!("progress", event.kind());
    assert_eq!("j1", event.job_id());
    Ok(())
}
