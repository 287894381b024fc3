use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::models::Invoice;
use crate::services::state::InvoiceStore;

pub const DEFAULT_INTERVAL_MS: i64 = 5_000;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Source of canonical invoice records.
#[async_trait]
pub trait InvoiceFetcher: Send + Sync {
    async fn fetch_invoice(&self, id: i64) -> Result<Invoice, ApiError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollerOptions {
    pub enabled: bool,
    /// Non-positive values never schedule a timer.
    pub interval_ms: i64,
    pub fetch_timeout: Option<Duration>,
}

impl Default for PollerOptions {
    fn default() -> Self {
        PollerOptions {
            enabled: true,
            interval_ms: DEFAULT_INTERVAL_MS,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

impl PollerOptions {
    fn period(&self) -> Option<Duration> {
        u64::try_from(self.interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Outcome of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub attempted: usize,
    pub refreshed: usize,
    pub failed: usize,
}

pub struct InvoicePoller {
    shared: Arc<PollerShared>,
}

struct PollerShared {
    fetcher: Arc<dyn InvoiceFetcher>,
    store: InvoiceStore,
    control: Mutex<Control>,
}

struct Control {
    options: PollerOptions,
    started: bool,
    timer: Option<ActiveTimer>,
    listener: Option<CancellationToken>,
    next_generation: u64,
}

struct ActiveTimer {
    generation: u64,
    cancel: CancellationToken,
}

impl InvoicePoller {
    pub fn new(fetcher: Arc<dyn InvoiceFetcher>, store: InvoiceStore, options: PollerOptions) -> Self {
        InvoicePoller {
            shared: Arc::new(PollerShared {
                fetcher,
                store,
                control: Mutex::new(Control {
                    options,
                    started: false,
                    timer: None,
                    listener: None,
                    next_generation: 0,
                }),
            }),
        }
    }

    pub fn store(&self) -> &InvoiceStore {
        &self.shared.store
    }

    pub fn options(&self) -> PollerOptions {
        self.shared.control().options.clone()
    }

    /// Begins scheduling. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut control = self.shared.control();
        control.started = true;
        if control.listener.is_none() {
            let cancel = CancellationToken::new();
            control.listener = Some(cancel.clone());
            let shared = Arc::clone(&self.shared);
            let changes = self.shared.store.subscribe();
            tokio::spawn(async move {
                shared.follow_store(changes, cancel).await;
            });
        }
        self.shared.reschedule(&mut control);
    }

    /// Cancels the timer. Calling it while stopped does nothing.
    pub fn stop(&self) {
        let mut control = self.shared.control();
        control.started = false;
        if let Some(listener) = control.listener.take() {
            listener.cancel();
        }
        cancel_timer(&mut control);
    }

    pub fn set_invoices(&self, invoices: Vec<Invoice>) {
        self.shared.store.set_invoices(invoices);
        self.reevaluate();
    }

    pub fn set_enabled(&self, enabled: bool) {
        let mut control = self.shared.control();
        control.options.enabled = enabled;
        self.shared.reschedule(&mut control);
    }

    pub fn set_interval_ms(&self, interval_ms: i64) {
        let mut control = self.shared.control();
        control.options.interval_ms = interval_ms;
        self.shared.reschedule(&mut control);
    }

    /// Re-reads the pending set and restarts the timer accordingly.
    pub fn reevaluate(&self) {
        let mut control = self.shared.control();
        self.shared.reschedule(&mut control);
    }

    pub fn pending_count(&self) -> usize {
        self.shared.store.pending_ids().len()
    }

    pub fn is_polling(&self) -> bool {
        let enabled = self.shared.control().options.enabled;
        enabled && self.pending_count() > 0
    }

    /// Whether a timer task is currently alive.
    pub fn is_scheduled(&self) -> bool {
        self.shared.control().timer.is_some()
    }

    /// Runs one refresh cycle now. Calls are not deduplicated.
    pub async fn refresh_now(&self) -> RefreshReport {
        let report = self.shared.refresh_cycle().await;
        self.shared.settle();
        report
    }
}

impl Drop for InvoicePoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PollerShared {
    fn control(&self) -> MutexGuard<'_, Control> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn reschedule(self: &Arc<Self>, control: &mut Control) {
        cancel_timer(control);

        if !control.started || !control.options.enabled {
            return;
        }
        let Some(period) = control.options.period() else {
            tracing::warn!(
                interval_ms = control.options.interval_ms,
                "Invoice polling interval is not positive, not scheduling"
            );
            return;
        };
        let pending = self.store.pending_ids().len();
        if pending == 0 {
            return;
        }

        control.next_generation += 1;
        let generation = control.next_generation;
        let cancel = CancellationToken::new();
        control.timer = Some(ActiveTimer {
            generation,
            cancel: cancel.clone(),
        });

        tracing::info!(pending, interval_ms = control.options.interval_ms, "Invoice polling started");
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            shared.run_timer(generation, period, cancel).await;
        });
    }

    /// Restarts a finished timer when store writes add pending invoices.
    /// A live timer picks them up on its next tick.
    async fn follow_store(self: Arc<Self>, mut changes: watch::Receiver<u64>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let mut control = self.control();
            if control.timer.is_none() && self.wants_timer(&control) {
                tracing::debug!("Store change added pending invoices");
                self.reschedule(&mut control);
            }
        }
    }

    fn wants_timer(&self, control: &Control) -> bool {
        control.started
            && control.options.enabled
            && control.options.period().is_some()
            && !self.store.pending_ids().is_empty()
    }

    async fn run_timer(self: Arc<Self>, generation: u64, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                report = self.refresh_cycle() => {
                    tracing::debug!(
                        attempted = report.attempted,
                        refreshed = report.refreshed,
                        failed = report.failed,
                        "Invoice refresh cycle finished"
                    );
                }
            }

            self.settle();
        }

        let mut control = self.control();
        if control
            .timer
            .as_ref()
            .is_some_and(|timer| timer.generation == generation)
        {
            control.timer = None;
        }
    }

    async fn refresh_cycle(&self) -> RefreshReport {
        let options = self.control().options.clone();
        let mut report = RefreshReport::default();
        if !options.enabled {
            return report;
        }

        for id in self.store.pending_ids() {
            report.attempted += 1;
            let fetch = self.fetcher.fetch_invoice(id);
            let result = match options.fetch_timeout {
                Some(limit) => tokio::time::timeout(limit, fetch)
                    .await
                    .unwrap_or_else(|_| Err(ApiError::Timeout(limit))),
                None => fetch.await,
            };

            match result {
                Ok(invoice) => {
                    self.store.replace_invoice(invoice);
                    report.refreshed += 1;
                }
                Err(err) => {
                    tracing::warn!(invoice_id = id, error = %err, "Invoice refresh failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Cancels the timer once nothing is left to poll.
    fn settle(&self) {
        let mut control = self.control();
        // Read under the control lock so a concurrent set_invoices either
        // lands before this check or reschedules after the cancel.
        if !self.store.pending_ids().is_empty() {
            return;
        }
        if control.timer.is_some() {
            tracing::info!("No invoice left in processing, polling stopped");
            cancel_timer(&mut control);
        }
    }
}

fn cancel_timer(control: &mut Control) {
    if let Some(timer) = control.timer.take() {
        timer.cancel.cancel();
    }
}
