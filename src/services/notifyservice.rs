use async_channel::Receiver;
use bytes::Bytes;
use futures::future::join_all;
use http_body_util::Full;
use tokio::{task::JoinHandle, time};
#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

use crate::models::{AppState, Error, JobRecord};
use std::sync::Arc;

/// Webhook dispatcher for terminal-failed records. Fed by the store through
/// a bounded channel so delivery never blocks the write path.
#[derive(Debug)]
pub struct NotifyService {
    app_state: Arc<AppState>,
}

impl NotifyService {
    pub fn new(app_state: Arc<AppState>) -> Self {
        Self { app_state }
    }

    pub async fn run(&self) -> Result<(), Error> {
        let instance_id = &self.app_state.instance_id;
        let app_state: &Arc<AppState> = &self.app_state;
        let (Some(options), Some(rx)) = (&app_state.notify_options, &app_state.notify_rx) else {
            warn!({ instance_id }, "disabled");
            return Ok(());
        };
        info!({ instance_id, url = options.url.as_str() }, "start");

        let mut running_workers: Vec<JoinHandle<()>> = Vec::with_capacity(options.workers_count);
        for idx in 0..options.workers_count {
            let join_handle = tokio::spawn({
                let state = Arc::clone(app_state);
                let rx_worker = rx.clone();
                async move { run_worker(&state, idx, rx_worker).await }
            });
            running_workers.push(join_handle);
        }

        app_state.shutdown_token.cancelled().await;
        // closing the channel drains in-flight records, then workers exit
        rx.close();
        join_all(running_workers.iter_mut()).await;
        info!({ instance_id }, "stop");
        Ok(())
    }
}

async fn run_worker(app_state: &Arc<AppState>, idx: usize, rx: Receiver<JobRecord>) {
    let instance_id = &app_state.instance_id;
    info!({ instance_id, idx }, "run_worker");
    while let Ok(record) = rx.recv().await {
        notify(app_state, &record).await;
    }
    info!({ instance_id, idx }, "stop_worker");
}

pub async fn notify(app_state: &AppState, record: &JobRecord) {
    let res = notify_with_error(app_state, record).await;
    if let Err(err) = res {
        let job_id = &record.job_id;
        error!({ instance_id = app_state.instance_id, job_id }, "notify error {:?}", err);
    }
}

async fn notify_with_error(app_state: &AppState, record: &JobRecord) -> Result<(), Error> {
    let options = app_state
        .notify_options
        .as_ref()
        .ok_or(Error::InvalidParams("webhook"))?;
    let body = serde_json::to_vec(record)?;
    let req = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(options.url.as_str())
        .header(hyper::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))?;
    let future = app_state.client.request(req);
    // first '?' - timeout
    // second '?' - HyperClientError
    let response = time::timeout(options.timeout, future).await??;
    let job_id = &record.job_id;
    if !response.status().is_success() {
        warn!(
            { instance_id = app_state.instance_id, job_id },
            "====> webhook status {}",
            response.status().as_u16()
        );
    } else {
        debug!({ instance_id = app_state.instance_id, job_id }, "====> notified");
    }
    Ok(())
}
