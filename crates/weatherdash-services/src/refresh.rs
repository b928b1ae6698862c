//! Periodic refresh of the widgets on screen.
//!
//! Every tick fans out one fetch per widget, waits for all of them, and
//! writes successful results back into the shared list. A failed fetch keeps
//! the widget's last known data.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use weatherdash_weather::ConditionsSource;

use crate::widget_list::{RefreshApply, SharedWidgetList};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub updated: usize,
    pub failed: usize,
    /// Results dropped because a newer tick already wrote the widget.
    pub stale: usize,
    /// Results for widgets removed while the fetch was in flight.
    pub missing: usize,
}

pub struct RefreshLoop<S> {
    source: Arc<S>,
    widgets: SharedWidgetList,
    interval: Duration,
    last_tick: u64,
    reports: Option<mpsc::UnboundedSender<TickReport>>,
}

impl<S: ConditionsSource> RefreshLoop<S> {
    pub fn new(source: Arc<S>, widgets: SharedWidgetList, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            tracing::warn!("Refresh interval {:?} too small, using {:?}", interval, MIN_INTERVAL);
        }
        Self {
            source,
            widgets,
            interval: interval.max(MIN_INTERVAL),
            last_tick: 0,
            reports: None,
        }
    }

    /// Publish a `TickReport` after every tick.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<TickReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one refresh over the current widgets.
    pub async fn tick(&mut self) -> TickReport {
        self.last_tick += 1;
        let tick = self.last_tick;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        let targets: Vec<_> = self
            .widgets
            .read()
            .iter()
            .map(|w| (w.id, w.city.clone(), w.unit))
            .collect();
        if targets.is_empty() {
            return report;
        }

        let mut fetches = JoinSet::new();
        for (id, city, unit) in targets {
            let source = Arc::clone(&self.source);
            fetches.spawn(async move {
                let result = source.fetch_conditions(&city, unit).await;
                (id, city, result)
            });
        }

        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((id, _, Ok(conditions))) => {
                    let outcome = self.widgets.write().apply_refresh(id, tick, conditions);
                    match outcome {
                        RefreshApply::Applied => report.updated += 1,
                        RefreshApply::Stale => report.stale += 1,
                        RefreshApply::Missing => report.missing += 1,
                    }
                }
                Ok((id, city, Err(e))) => {
                    tracing::warn!("Refresh of widget {} ({}) failed, keeping last data: {}", id, city, e);
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::warn!("Refresh task in tick {} did not complete: {}", tick, e);
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            "Refresh tick {}: {} updated, {} failed, {} stale, {} missing",
            tick,
            report.updated,
            report.failed,
            report.stale,
            report.missing
        );
        report
    }

    /// Tick every interval until `cancel` fires. The first tick happens one
    /// full interval after start; ticks never overlap.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut timer = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!("Refresh loop started (every {:?})", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = timer.tick() => {
                    let report = self.tick().await;
                    if let Some(reports) = &self.reports {
                        // The receiver going away just means nobody is rendering.
                        let _ = reports.send(report);
                    }
                }
            }
        }

        tracing::info!("Refresh loop stopped after {} tick(s)", self.last_tick);
    }

    /// Run the loop on the current runtime.
    pub fn spawn(self) -> RefreshHandle {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(self.run(cancel.clone()));
        RefreshHandle {
            cancel,
            join: Some(join),
        }
    }
}

/// Owner of a spawned refresh loop. Dropping it cancels the loop.
pub struct RefreshHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Cancel future ticks and wait for the loop to exit. A tick already in
    /// progress is allowed to finish.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!("Refresh loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
