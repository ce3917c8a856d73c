use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::error::{CheckError, StoreError};
use crate::feed::FeedFetcher;
use crate::identity::{AppIdentity, Namespace};
use crate::parser::{PointerWidth, parse_feed, select_candidate};
use crate::store::DecisionStore;
use crate::version::Version;

const OUTCOME_CHANNEL_CAPACITY: usize = 16;

/// Immutable inputs of every check cycle for one host application.
#[derive(Debug, Clone)]
pub struct CheckContext {
    pub feed_url: String,
    pub installed_version: Version,
    pub identity: AppIdentity,
    pub pointer_width: PointerWidth,
    /// Interval used when the presentation layer does not ask the user.
    pub remind_later: RemindLater,
}

impl CheckContext {
    #[must_use]
    pub fn new(
        feed_url: impl Into<String>,
        installed_version: Version,
        identity: AppIdentity,
    ) -> Self {
        Self {
            feed_url: feed_url.into(),
            installed_version,
            identity,
            pointer_width: PointerWidth::host(),
            remind_later: RemindLater::default(),
        }
    }

    #[must_use]
    pub fn with_pointer_width(mut self, pointer_width: PointerWidth) -> Self {
        self.pointer_width = pointer_width;
        self
    }

    #[must_use]
    pub fn with_remind_later(mut self, remind_later: RemindLater) -> Self {
        self.remind_later = remind_later;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemindLaterUnit {
    Minutes,
    Hours,
    #[default]
    Days,
}

impl std::fmt::Display for RemindLaterUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minutes => write!(f, "minutes"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemindLater {
    pub amount: u32,
    pub unit: RemindLaterUnit,
}

impl RemindLater {
    #[must_use]
    pub fn new(amount: u32, unit: RemindLaterUnit) -> Self {
        Self { amount, unit }
    }

    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            RemindLaterUnit::Minutes => chrono::Duration::minutes(amount),
            RemindLaterUnit::Hours => chrono::Duration::hours(amount),
            RemindLaterUnit::Days => chrono::Duration::days(amount),
        }
    }
}

impl Default for RemindLater {
    fn default() -> Self {
        Self::new(2, RemindLaterUnit::Days)
    }
}

/// What a completed check found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub update_available: bool,
    pub installed_version: Version,
    /// `None` when the feed had no entry with a usable version.
    pub latest_version: Option<Version>,
    pub download_url: Option<String>,
    pub changelog_url: Option<String>,
    pub title: Option<String>,
}

impl CheckResult {
    fn nothing_new(installed_version: Version) -> Self {
        Self {
            update_available: false,
            installed_version,
            latest_version: None,
            download_url: None,
            changelog_url: None,
            title: None,
        }
    }
}

/// The single notification delivered per check cycle.
#[derive(Debug)]
pub enum CheckOutcome {
    Checked(CheckResult),
    Failed(CheckError),
}

impl CheckOutcome {
    #[must_use]
    pub fn is_update_available(&self) -> bool {
        matches!(self, Self::Checked(result) if result.update_available)
    }

    #[must_use]
    pub fn result(&self) -> Option<&CheckResult> {
        match self {
            Self::Checked(result) => Some(result),
            Self::Failed(_) => None,
        }
    }
}

/// How a single cycle ended.
#[derive(Debug)]
pub enum Cycle {
    /// A remind-later deadline is still pending; nothing was fetched.
    Deferred { until: DateTime<Utc> },
    Finished(CheckOutcome),
}

struct PendingRecheck {
    at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

struct EngineInner {
    context: CheckContext,
    namespace: Namespace,
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn DecisionStore>,
    clock: Arc<dyn Clock>,
    outcomes: mpsc::Sender<CheckOutcome>,
    cycle_gate: tokio::sync::Mutex<()>,
    recheck: Mutex<Option<PendingRecheck>>,
}

/// Runs update check cycles for one host application and applies the user's
/// skip / remind-later decisions.
///
/// Cycles never overlap: a cycle started while another is running waits for
/// it. Background work (`start`, `remind_later`) must be requested from
/// inside a Tokio runtime.
#[derive(Clone)]
pub struct UpdateEngine {
    inner: Arc<EngineInner>,
}

impl UpdateEngine {
    /// Create an engine and the receiver on which each started cycle
    /// delivers its outcome.
    #[must_use]
    pub fn new(
        context: CheckContext,
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn DecisionStore>,
    ) -> (Self, mpsc::Receiver<CheckOutcome>) {
        Self::with_clock(context, fetcher, store, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        context: CheckContext,
        fetcher: Arc<dyn FeedFetcher>,
        store: Arc<dyn DecisionStore>,
        clock: Arc<dyn Clock>,
    ) -> (Self, mpsc::Receiver<CheckOutcome>) {
        let (outcomes, receiver) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        let namespace = context.identity.namespace();
        let engine = Self {
            inner: Arc::new(EngineInner {
                context,
                namespace,
                fetcher,
                store,
                clock,
                outcomes,
                cycle_gate: tokio::sync::Mutex::new(()),
                recheck: Mutex::new(None),
            }),
        };
        (engine, receiver)
    }

    #[must_use]
    pub fn context(&self) -> &CheckContext {
        &self.inner.context
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    /// Begin a check cycle in the background. Its outcome arrives on the
    /// receiver returned by [`UpdateEngine::new`]; a deferred cycle delivers
    /// nothing until its re-check fires.
    ///
    /// A manual start replaces any pending remind-later re-check.
    pub fn start(&self) {
        self.cancel_recheck();
        self.spawn_cycle();
    }

    /// Run one cycle and wait for it.
    ///
    /// Unlike [`UpdateEngine::start`] this neither publishes the outcome nor
    /// arms a re-check when the cycle is deferred. A panic inside the cycle
    /// is reported as [`CheckError::Internal`].
    pub async fn check_once(&self) -> Cycle {
        let worker = self.clone();
        match tokio::spawn(async move { worker.run_cycle().await }).await {
            Ok(cycle) => cycle,
            Err(error) => {
                warn!(
                    "Update check for {} panicked: {error}",
                    self.inner.namespace
                );
                Cycle::Finished(CheckOutcome::Failed(CheckError::Internal(format!(
                    "check task failed: {error}"
                ))))
            }
        }
    }

    async fn run_cycle(&self) -> Cycle {
        let _gate = self.inner.cycle_gate.lock().await;
        match self.evaluate().await {
            Ok(cycle) => cycle,
            Err(error) => {
                warn!("Update check for {} failed: {error}", self.inner.namespace);
                Cycle::Finished(CheckOutcome::Failed(error))
            }
        }
    }

    /// Never offer `version` (or anything older) again, until a newer
    /// version shows up in the feed.
    ///
    /// # Errors
    /// Returns an error when the decision cannot be persisted.
    pub fn skip(&self, version: &Version) -> Result<(), StoreError> {
        info!("Skipping version {version} for {}", self.inner.namespace);
        self.inner.store.write_skip(&self.inner.namespace, version)
    }

    /// Suppress checks for `interval`, then check again automatically.
    ///
    /// Returns the deadline that was persisted. Replaces any earlier reminder.
    ///
    /// # Errors
    /// Returns an error when the deadline cannot be persisted; no re-check is
    /// armed in that case.
    pub fn remind_later(&self, interval: RemindLater) -> Result<DateTime<Utc>, StoreError> {
        let deadline = self
            .inner
            .clock
            .now()
            .checked_add_signed(interval.duration())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.inner
            .store
            .write_remind_after(&self.inner.namespace, deadline)?;
        info!(
            "Reminding about updates for {} in {} {} (at {deadline})",
            self.inner.namespace, interval.amount, interval.unit
        );
        self.schedule_recheck(deadline);
        Ok(deadline)
    }

    /// [`UpdateEngine::remind_later`] with the context's default interval.
    ///
    /// # Errors
    /// Returns an error when the deadline cannot be persisted.
    pub fn remind_later_default(&self) -> Result<DateTime<Utc>, StoreError> {
        self.remind_later(self.inner.context.remind_later)
    }

    /// The user closed the notification without deciding. Nothing is stored.
    pub fn dismiss(&self) {
        debug!("Update notification for {} dismissed", self.inner.namespace);
    }

    /// When the armed remind-later re-check will fire, if one is armed.
    #[must_use]
    pub fn pending_recheck(&self) -> Option<DateTime<Utc>> {
        let slot = self
            .inner
            .recheck
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.as_ref()
            .filter(|pending| !pending.handle.is_finished())
            .map(|pending| pending.at)
    }

    async fn evaluate(&self) -> Result<Cycle, CheckError> {
        let inner = &*self.inner;
        let namespace = &inner.namespace;
        let installed = inner.context.installed_version;

        let state = inner.store.read_state(namespace)?;
        if let Some(until) = state.pending_reminder(inner.clock.now()) {
            info!("Update check for {namespace} deferred until {until}");
            return Ok(Cycle::Deferred { until });
        }

        let feed = inner.fetcher.fetch(&inner.context.feed_url).await?;
        let candidates = parse_feed(&feed.body, &feed.origin)?;
        let Some(candidate) = select_candidate(candidates) else {
            debug!("Update feed for {namespace} has no usable version");
            return Ok(Cycle::Finished(CheckOutcome::Checked(
                CheckResult::nothing_new(installed),
            )));
        };
        let latest = candidate.version;

        let mut suppressed = false;
        if let Some(skipped) = state.active_skip() {
            if latest <= skipped {
                info!("Version {latest} for {namespace} was skipped by the user");
                suppressed = true;
            } else {
                info!("Version {latest} supersedes skipped {skipped} for {namespace}");
                inner.store.clear_skip(namespace, &latest)?;
            }
        }

        let update_available = !suppressed && latest > installed;
        if update_available {
            info!("Update available for {namespace}: {installed} -> {latest}");
        } else {
            debug!("No update for {namespace} (installed {installed}, feed {latest})");
        }

        Ok(Cycle::Finished(CheckOutcome::Checked(CheckResult {
            update_available,
            installed_version: installed,
            latest_version: Some(latest),
            download_url: candidate
                .download_url_for(inner.context.pointer_width)
                .map(str::to_string),
            changelog_url: candidate.changelog_url,
            title: candidate.title,
        })))
    }

    fn spawn_cycle(&self) {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.check_once().await {
                Cycle::Deferred { until } => engine.schedule_recheck(until),
                Cycle::Finished(outcome) => engine.publish(outcome).await,
            }
        });
    }

    async fn publish(&self, outcome: CheckOutcome) {
        if self.inner.outcomes.send(outcome).await.is_err() {
            debug!(
                "No listener for update outcomes of {}",
                self.inner.namespace
            );
        }
    }

    fn schedule_recheck(&self, at: DateTime<Utc>) {
        let delay = (at - self.inner.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                debug!("Remind-later re-check for {} fired", inner.namespace);
                UpdateEngine { inner }.spawn_cycle();
            }
        });

        let mut slot = self
            .inner
            .recheck
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(PendingRecheck { at, handle }) {
            previous.handle.abort();
        }
        debug!("Re-check for {} armed for {at}", self.inner.namespace);
    }

    fn cancel_recheck(&self) {
        let previous = self
            .inner
            .recheck
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }
}

impl std::fmt::Debug for UpdateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateEngine")
            .field("context", &self.inner.context)
            .field("namespace", &self.inner.namespace)
            .finish_non_exhaustive()
    }
}
