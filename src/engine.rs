use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::config::MonitorConfig;
use crate::prober::Prober;
use crate::store::Store;

/// Outcome counts of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub total: usize,
    pub up: usize,
    pub down: usize,
}

pub struct Monitor {
    pub config: Arc<MonitorConfig>,
    prober: Arc<Prober>,
    store: Option<Arc<Store>>,
}

impl Monitor {
    /// Without a store, rounds only log and alert.
    pub fn new(config: MonitorConfig, store: Option<Arc<Store>>) -> Result<Self> {
        config.validate()?;
        let prober = Prober::new(
            config.request_timeout(),
            config.webhook().map(str::to_string),
        )?;
        Ok(Self {
            config: Arc::new(config),
            prober: Arc::new(prober),
            store,
        })
    }

    pub fn store(&self) -> Option<&Arc<Store>> {
        self.store.as_ref()
    }

    /// Probes every target concurrently and returns once all of them finished.
    pub async fn run_round(&self) -> RoundSummary {
        let start_time = Instant::now();
        let mut tasks = FuturesUnordered::new();

        for target in &self.config.pages {
            let prober = Arc::clone(&self.prober);
            let target = target.clone();
            tasks.push(tokio::spawn(async move { prober.probe(&target).await }));
        }

        let mut summary = RoundSummary { total: tasks.len(), ..Default::default() };
        while let Some(join_res) = tasks.next().await {
            let result = match join_res {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Probe task failed");
                    continue;
                }
            };

            if result.status {
                summary.up += 1;
            } else {
                summary.down += 1;
            }
            if let Some(store) = &self.store {
                store.update_result(result).await;
            }
        }

        info!(
            total = summary.total,
            up = summary.up,
            down = summary.down,
            "Round completed in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
        summary
    }

    /// Runs rounds forever, one per `check_interval`. A round that overruns the
    /// interval delays the next one instead of overlapping it.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            targets = self.config.pages.len(),
            interval_secs = self.config.check_interval,
            alerts = self.prober.notifier().is_enabled(),
            "Health checker started"
        );

        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.run_round().await;
        }
    }
}
