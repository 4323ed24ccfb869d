use tokio::{select, time};
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

use crate::models::{AppState, Error, SweeperOptions};
use std::sync::Arc;

/// Periodic retention pass over the record store. Old finished records
/// expire past the horizon; the count cap evicts oldest-finished-first.
#[derive(Debug)]
pub struct SweeperService {
    app_state: Arc<AppState>,
}

impl SweeperService {
    pub fn new(app_state: Arc<AppState>) -> Self {
        Self { app_state }
    }

    pub async fn run(&self) -> Result<(), Error> {
        let instance_id = &self.app_state.instance_id;
        let Some(options) = &self.app_state.sweeper_options else {
            warn!({ instance_id }, "disabled");
            return Ok(());
        };
        info!({ instance_id }, "start");
        let mut interval = time::interval(options.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        while !self.app_state.shutdown_token.is_cancelled() {
            if let Err(err) = self.tick(options).await {
                error!({ instance_id }, "error {}", err);
            }
            select!(
                biased;
                _ = self.app_state.shutdown_token.cancelled() => {}
                _ = interval.tick() => {},
            );
        }
        info!({ instance_id }, "stop");
        Ok(())
    }

    async fn tick(&self, options: &SweeperOptions) -> Result<(), Error> {
        let instance_id = &self.app_state.instance_id;
        trace!({ instance_id }, "tick");
        let deleted = self
            .app_state
            .store
            .sweep(options, &self.app_state.shutdown_token)
            .await?;
        if deleted > 0 {
            debug!({ instance_id, deleted }, "store.sweep");
        }
        Ok(())
    }
}
