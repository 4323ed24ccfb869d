use axum::http::StatusCode;
use problemdetails::Problem;
use tokio::time::error::Elapsed;

use super::JobStatus;

// region:    Error
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Job Not Found - {0}")]
    JobNotFound(String),

    #[error("Duplicate Start - {0}")]
    DuplicateStart(String),

    #[error("Invalid Transition - {job_id} is {status}, rejected {kind}")]
    InvalidTransition {
        job_id: String,
        status: JobStatus,
        kind: &'static str,
    },

    #[error("Invalid Params - {0}")]
    InvalidParams(&'static str),

    #[error(transparent)]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    DbError(#[from] sqlx::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    HttpError(#[from] axum::http::Error),

    #[error(transparent)]
    HyperError(#[from] hyper::Error),

    #[error(transparent)]
    HyperClientError(#[from] hyper_util::client::legacy::Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl From<Error> for Problem {
    fn from(item: Error) -> Problem {
        match item {
            Error::InvalidParams(_) => problemdetails::new(StatusCode::BAD_REQUEST)
                .with_title(StatusCode::BAD_REQUEST.to_string())
                .with_detail(item.to_string()),
            Error::JobNotFound(_) | Error::DbError(sqlx::Error::RowNotFound) => {
                problemdetails::new(StatusCode::NOT_FOUND)
                    .with_title(StatusCode::NOT_FOUND.to_string())
                    .with_detail(item.to_string())
            }
            Error::DuplicateStart(_) | Error::InvalidTransition { .. } => {
                problemdetails::new(StatusCode::CONFLICT)
                    .with_title(StatusCode::CONFLICT.to_string())
                    .with_detail(item.to_string())
            }
            _ => problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                .with_title(StatusCode::INTERNAL_SERVER_ERROR.to_string())
                .with_detail(item.to_string())
                .with_instance(format!("{:?}", item)),
        }
    }
}
