use async_channel::Receiver;
use bytes::Bytes;
use dotenv::dotenv;
use http_body_util::Full;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Pool, Postgres,
};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::ingest::EventIngestor;
use crate::store::JobRecordStore;

use super::JobRecord;

pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

#[derive(Debug)]
pub struct AppState {
    pub instance_id: String,
    pub pool: Pool<Postgres>,
    pub client: HttpsClient,
    pub ingestor: EventIngestor,
    pub store: JobRecordStore,
    pub sweeper_options: Option<SweeperOptions>,
    pub notify_options: Option<NotifyOptions>,
    pub notify_rx: Option<Receiver<JobRecord>>,
    pub shutdown_token: CancellationToken,
}

#[derive(Debug)]
pub struct SweeperOptions {
    pub poll_interval: Duration,
    pub horizon_days: i64,
    pub max_records: i64,
    pub batch_size: i64,
}

#[derive(Debug)]
pub struct NotifyOptions {
    pub url: Url,
    pub timeout: Duration,
    pub workers_count: usize,
}

impl AppState {
    pub async fn new() -> Arc<AppState> {
        dotenv().ok();
        let hostname = whoami::hostname();
        let instance_id = format!("{}:1", hostname);
        let db_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let conn = PgConnectOptions::from_str(&db_url)
            .expect("Unable to parse DATABASE_URL")
            .application_name(&instance_id);

        let pool = PgPoolOptions::new()
            .max_connections(32)
            .connect_with(conn)
            .await
            .expect("Unable to connect to Postgres");

        let client: HttpsClient =
            Client::builder(TokioExecutor::new()).build(HttpsConnector::new());

        let ingestor = EventIngestor::new(
            env_string("QUEUEMON_DEFAULT_CONNECTION", "default"),
            env_parse("QUEUEMON_MAX_PAYLOAD_BYTES", 65535),
        );

        let sweep_interval: u64 = env_parse("QUEUEMON_SWEEP_INTERVAL_SECS", 300);
        let sweeper_options = (sweep_interval > 0).then(|| SweeperOptions {
            poll_interval: Duration::from_secs(sweep_interval),
            horizon_days: env_parse("QUEUEMON_RETENTION_DAYS", 30),
            max_records: env_parse("QUEUEMON_MAX_RECORDS", 100_000),
            batch_size: env_parse("QUEUEMON_SWEEP_BATCH", 500),
        });

        let notify_options = std::env::var("QUEUEMON_WEBHOOK_URL")
            .ok()
            .filter(|raw| !raw.is_empty())
            .map(|raw| NotifyOptions {
                url: Url::parse(&raw).expect("Unable to parse QUEUEMON_WEBHOOK_URL"),
                timeout: Duration::from_millis(env_parse("QUEUEMON_WEBHOOK_TIMEOUT_MS", 5000)),
                workers_count: env_parse("QUEUEMON_NOTIFY_WORKERS", 2),
            });

        // No webhook configured means no channel, the store then skips dispatch.
        let (notify_tx, notify_rx) = if notify_options.is_some() {
            let (tx, rx) = async_channel::bounded::<JobRecord>(256);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let store = JobRecordStore::new(pool.clone(), notify_tx);

        let state = AppState {
            instance_id,
            pool,
            client,
            ingestor,
            store,
            sweeper_options,
            notify_options,
            notify_rx,
            shutdown_token: CancellationToken::new(),
        };
        Arc::new(state)
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
