//! The scan worker.
//!
//! A worker runs exactly one lookup per invocation on a spawned task and
//! reports what happens through a fresh event channel. Every failure is
//! caught here and turned into a `Failed` event.

use crate::channel::{event_channel, EventSender, EventStream};
use crate::error::{Result, ScanError};
use crate::event::ScanEvent;
use futures::StreamExt;
use osprey_collectors::{
    AccountEnumerator, HttpAccountProber, RdapDomainLookup, RdapIpLookup, RecordLookup, SiteChecks,
};
use osprey_core::{AppConfig, ScanCategory, ScanningConfig, TargetName};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Rate limits wait this many times longer than other transient failures.
const RATE_LIMIT_BACKOFF_MULTIPLIER: u32 = 3;

/// Retry behaviour for single-shot lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Try once, never retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Policy from the scanning section of the config.
    #[must_use]
    pub fn from_config(config: &ScanningConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// How long to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let multiplier = if rate_limited {
            RATE_LIMIT_BACKOFF_MULTIPLIER
        } else {
            1
        };
        self.base_delay
            .saturating_mul(attempt.saturating_mul(multiplier))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ScanningConfig::default())
    }
}

/// A running scan.
#[derive(Debug)]
pub struct ScanHandle {
    /// Unique id of this invocation
    pub scan_id: Uuid,
    /// What kind of scan this is
    pub category: ScanCategory,
    /// What is being scanned
    pub target: TargetName,
    /// Events from the worker, in emission order
    pub events: EventStream,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ScanHandle {
    /// Ask the worker to stop. The scan ends with `Failed("scan cancelled")`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this scan when triggered.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the worker task to exit.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(scan_id = %self.scan_id, error = %e, "scan task did not exit cleanly");
        }
    }

    pub(crate) fn into_parts(self) -> (EventStream, JoinHandle<()>) {
        (self.events, self.task)
    }
}

/// Runs lookups and reports their progress as [`ScanEvent`]s.
///
/// Collectors are optional so a worker can be built for a subset of
/// categories; scanning a category without a collector fails the scan.
#[derive(Clone, Default)]
pub struct ScanWorker {
    accounts: Option<Arc<dyn AccountEnumerator>>,
    domain: Option<Arc<dyn RecordLookup>>,
    ip: Option<Arc<dyn RecordLookup>>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ScanWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanWorker")
            .field("accounts", &self.accounts.as_ref().map(|c| c.name().to_string()))
            .field("domain", &self.domain.as_ref().map(|c| c.name().to_string()))
            .field("ip", &self.ip.as_ref().map(|c| c.name().to_string()))
            .field("retry", &self.retry)
            .finish()
    }
}

impl ScanWorker {
    /// A worker with no collectors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker with the HTTP and RDAP collectors built from config.
    pub fn from_config(config: &AppConfig) -> osprey_collectors::Result<Self> {
        Ok(Self::new()
            .with_account_enumerator(Arc::new(HttpAccountProber::from_config(
                &config.scanning,
            )?))
            .with_domain_lookup(Arc::new(RdapDomainLookup::from_config(config)?))
            .with_ip_lookup(Arc::new(RdapIpLookup::from_config(config)?))
            .with_retry_policy(RetryPolicy::from_config(&config.scanning)))
    }

    /// Use `enumerator` for "Username" scans.
    #[must_use]
    pub fn with_account_enumerator(mut self, enumerator: Arc<dyn AccountEnumerator>) -> Self {
        self.accounts = Some(enumerator);
        self
    }

    /// Use `lookup` for "Domain" scans.
    #[must_use]
    pub fn with_domain_lookup(mut self, lookup: Arc<dyn RecordLookup>) -> Self {
        self.domain = Some(lookup);
        self
    }

    /// Use `lookup` for "IP Address" scans.
    #[must_use]
    pub fn with_ip_lookup(mut self, lookup: Arc<dyn RecordLookup>) -> Self {
        self.ip = Some(lookup);
        self
    }

    /// Set the retry policy for single-shot lookups.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether this worker can scan `category`.
    #[must_use]
    pub fn supports(&self, category: &ScanCategory) -> bool {
        match category {
            ScanCategory::Username => self.accounts.is_some(),
            ScanCategory::Domain => self.domain.is_some(),
            ScanCategory::IpAddress => self.ip.is_some(),
            ScanCategory::Profiles | ScanCategory::Other(_) => false,
        }
    }

    /// Start a scan on a background task and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn run(&self, category: ScanCategory, target: TargetName) -> ScanHandle {
        let (sender, events) = event_channel();
        let cancel = CancellationToken::new();
        let scan_id = Uuid::new_v4();

        let span = info_span!("scan", %scan_id, category = %category, target = %target);
        let worker = self.clone();
        let task = {
            let category = category.clone();
            let target = target.clone();
            let cancel = cancel.clone();
            tokio::spawn(
                async move {
                    worker.execute(&category, &target, &sender, &cancel).await;
                }
                .instrument(span),
            )
        };

        ScanHandle {
            scan_id,
            category,
            target,
            events,
            cancel,
            task,
        }
    }

    /// Run a scan to completion on the current task.
    ///
    /// Emits `Started`, then any progress, then exactly one terminal event.
    /// Never fails; errors become `Failed` events.
    pub async fn execute(
        &self,
        category: &ScanCategory,
        target: &TargetName,
        events: &EventSender,
        cancel: &CancellationToken,
    ) {
        info!("scan started");
        events.emit(ScanEvent::Started);

        let terminal = match self.perform(category, target, events, cancel).await {
            Ok(record) => {
                info!(has_record = record.is_some(), "scan finished");
                ScanEvent::Finished { record }
            }
            Err(e) => {
                warn!(error = %e, "scan failed");
                ScanEvent::Failed {
                    message: e.to_string(),
                }
            }
        };
        events.emit(terminal);
    }

    async fn perform(
        &self,
        category: &ScanCategory,
        target: &TargetName,
        events: &EventSender,
        cancel: &CancellationToken,
    ) -> Result<Option<Value>> {
        let not_configured = || ScanError::NotConfigured(category.clone());
        match category {
            ScanCategory::Username => {
                let enumerator = self.accounts.as_deref().ok_or_else(not_configured)?;
                enumerate(enumerator, target, events, cancel).await?;
                Ok(None)
            }
            ScanCategory::Domain => {
                let lookup = self.domain.as_deref().ok_or_else(not_configured)?;
                self.lookup_with_retry(lookup, target, cancel).await.map(Some)
            }
            ScanCategory::IpAddress => {
                let lookup = self.ip.as_deref().ok_or_else(not_configured)?;
                self.lookup_with_retry(lookup, target, cancel).await.map(Some)
            }
            ScanCategory::Profiles | ScanCategory::Other(_) => {
                Err(ScanError::Unsupported(category.clone()))
            }
        }
    }

    async fn lookup_with_retry(
        &self,
        lookup: &dyn RecordLookup,
        target: &TargetName,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ScanError::Cancelled),
                result = lookup.lookup(target.as_str()) => result,
            };

            match result {
                Ok(record) => {
                    debug!(lookup = lookup.name(), attempt, "lookup succeeded");
                    return Ok(record);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.retry.delay_for(attempt, e.is_rate_limited());
                    warn!(
                        lookup = lookup.name(),
                        attempt,
                        max_attempts,
                        ?delay,
                        error = %e,
                        "lookup failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ScanError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn enumerate(
    enumerator: &dyn AccountEnumerator,
    target: &TargetName,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Result<()> {
    let SiteChecks { total, mut checks } = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(ScanError::Cancelled),
        checks = enumerator.enumerate(target.as_str()) => checks?,
    };
    debug!(enumerator = enumerator.name(), total, "enumeration started");

    let mut current = 0;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ScanError::Cancelled),
            next = checks.next() => next,
        };
        let Some(check) = next else {
            break;
        };
        if current == total {
            return Err(ScanError::Overrun { total });
        }

        current += 1;
        events.emit(ScanEvent::Progress { current, total });
        if check.status.is_found() {
            debug!(site = %check.site, url = %check.url, "positive hit");
            events.emit(ScanEvent::PartialResult {
                site: check.site,
                url: check.url,
                status: check.status,
            });
        }
    }

    if current < total {
        return Err(ScanError::Incomplete {
            checked: current,
            total,
        });
    }
    Ok(())
}
