pub use display::status_hint;
pub use display::DisplayHint;
pub use error::Error;
pub use event::IngestEvent;
pub use event::JobEvent;
pub use event::StartedJob;
pub use query::PagingResult;
pub use query::ScanFilter;
pub use query::SortDir;
pub use query::SortField;
pub use record::JobRecord;
pub use record::JobStatus;
pub use state::AppState;
pub use state::NotifyOptions;
pub use state::SweeperOptions;

mod display;
mod error;
mod event;
mod query;
mod record;
mod state;
