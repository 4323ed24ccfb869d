use serde::Serialize;

use super::JobStatus;

/// Presentation hint for a status badge; consumed by dashboard frontends,
/// never used on the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayHint {
    pub label: &'static str,
    pub color: &'static str,
}

pub const fn status_hint(status: JobStatus) -> DisplayHint {
    match status {
        JobStatus::Success => DisplayHint {
            label: "Success",
            color: "success",
        },
        JobStatus::Running => DisplayHint {
            label: "Running",
            color: "primary",
        },
        JobStatus::Failed => DisplayHint {
            label: "Failed",
            color: "danger",
        },
    }
}

pub const fn progress_color(progress: i32) -> &'static str {
    match progress {
        70.. => "success",
        30.. => "primary",
        _ => "danger",
    }
}

#[tokio::test]
async fn status_hints_match_badge_colors() -> anyhow::Result<()> {
    // act & assert
    assert_eq!("success", status_hint(JobStatus::Success).color);
    assert_eq!("primary", status_hint(JobStatus::Running).color);
    assert_eq!("danger", status_hint(JobStatus::Failed).color);
    Ok(())
}

#[tokio::test]
async fn progress_color_thresholds() -> anyhow::Result<()> {
    // act & assert
    assert_eq!("danger", progress_color(0));
    assert_eq!("danger", progress_color(29));
    assert_eq!("primary", progress_color(30));
    assert_eq!("primary", progress_color(69));
    assert_eq!("success", progress_color(70));
    assert_eq!("success", progress_color(100));
    Ok(())
}
