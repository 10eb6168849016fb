//! Bulk call dispatcher.
//!
//! Calls a fixed queue of leads one at a time, waiting a configured delay
//! between the completion of one call and the start of the next. The session
//! is an explicit `Idle | Running | Paused` state object behind one lock; the
//! only code that places calls is [`process_next`], and a driver ticket makes
//! sure at most one of them is ever active for a session.
//!
//! Calls are never interrupted. Pausing or cancelling takes effect when the
//! in-flight call returns; a result that arrives after a cancel still updates
//! its lead but no longer touches the session.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dialer::invoker::CallInvoker;
use crate::dialer::progress::{BulkProgress, ProgressReceiver};
use crate::error::AppError;
use crate::leads::{Lead, LeadStatus, LeadStore};
use crate::notify::{NotificationLevel, Notifier};
use crate::pearl::PlacedCall;

// ─────────────────────────────────────────────────────────────────────────────
// Session State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Paused => "paused",
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    phase: Phase,
    /// Only the driver holding this ticket may place calls.
    driver: u64,
    queue: VecDeque<Lead>,
    current_index: usize,
    total: usize,
    delay: Duration,
    in_flight: bool,
    /// Delay timer of the scheduled continuation, if any.
    pending: Option<CancellationToken>,
}

impl Session {
    fn snapshot(&self) -> BulkProgress {
        BulkProgress {
            in_progress: self.phase != Phase::Idle,
            paused: self.phase == Phase::Paused,
            current_index: self.current_index,
            total: self.total,
            delay_secs: self.delay.as_secs(),
            remaining: self.queue.len(),
        }
    }

    fn next_driver(&mut self) -> u64 {
        self.driver += 1;
        self.driver
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

struct Inner {
    invoker: Arc<dyn CallInvoker>,
    leads: LeadStore,
    notifier: Notifier,
    progress: watch::Sender<BulkProgress>,
    session: Mutex<Session>,
}

impl Inner {
    fn publish(&self, session: &Session) {
        self.progress.send_replace(session.snapshot());
    }

    /// Writes a call outcome to the lead and tells the user about it.
    async fn record_outcome(&self, lead: &Lead, outcome: &Result<PlacedCall, AppError>) {
        match outcome {
            Ok(placed) => {
                self.leads.mark_called(&lead.id, &placed.id).await;
                self.notifier
                    .success("Call started", format!("Calling {}", lead.full_name()));
            }
            Err(e) => {
                self.leads.mark_failed(&lead.id).await;
                let presentation = e.to_presentation();
                self.notifier.error(
                    "Call failed",
                    format!("{}: {}", lead.full_name(), presentation.message),
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BulkDispatcher
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to the bulk call dispatcher. Clones share one session.
#[derive(Clone)]
pub struct BulkDispatcher {
    inner: Arc<Inner>,
}

impl BulkDispatcher {
    pub fn new(invoker: Arc<dyn CallInvoker>, leads: LeadStore, notifier: Notifier) -> Self {
        let (progress, _) = watch::channel(BulkProgress::default());
        Self {
            inner: Arc::new(Inner {
                invoker,
                leads,
                notifier,
                progress,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> BulkProgress {
        *self.inner.progress.borrow()
    }

    /// Receives every progress change from now on.
    pub fn subscribe(&self) -> ProgressReceiver {
        self.inner.progress.subscribe()
    }

    /// Starts a session over the pending leads of `selection`, in selection
    /// order, and places the first call immediately.
    ///
    /// # Errors
    ///
    /// Fails without touching any state, after one warning notification:
    /// - `BulkCallInProgress` when a session is running or paused
    /// - `NoCampaignSelected` when no campaign credential is stored
    /// - `NoLeadsSelected` for an empty selection
    /// - `NoPendingLeads` when none of the selected leads is pending
    pub async fn start(&self, selection: &[String], delay: Duration) -> Result<BulkProgress, AppError> {
        let mut session = self.inner.session.lock().await;

        let queue = match self.prepare_queue(&session, selection).await {
            Ok(queue) => queue,
            Err(e) => {
                self.inner.notifier.app_error(NotificationLevel::Warning, &e);
                return Err(e);
            }
        };

        let driver = session.next_driver();
        session.phase = Phase::Running;
        session.total = queue.len();
        session.current_index = 0;
        session.queue = queue;
        session.delay = delay;
        session.in_flight = false;
        session.pending = None;

        let snapshot = session.snapshot();
        self.inner.publish(&session);

        info!(
            "[BULK] Session started: {} leads, {}s delay",
            snapshot.total,
            delay.as_secs()
        );
        self.inner.notifier.info(
            "Bulk call started",
            format!(
                "Starting {} calls with {}s between calls",
                snapshot.total,
                delay.as_secs()
            ),
        );

        tokio::spawn(process_next(Arc::clone(&self.inner), driver));
        Ok(snapshot)
    }

    async fn prepare_queue(
        &self,
        session: &Session,
        selection: &[String],
    ) -> Result<VecDeque<Lead>, AppError> {
        if session.phase != Phase::Idle {
            return Err(AppError::BulkCallInProgress);
        }
        if !self.inner.invoker.is_configured().await? {
            return Err(AppError::NoCampaignSelected);
        }
        if selection.is_empty() {
            return Err(AppError::NoLeadsSelected);
        }

        let queue: VecDeque<Lead> = self
            .inner
            .leads
            .resolve_selection(selection)
            .await
            .into_iter()
            .filter(Lead::is_pending)
            .collect();

        if queue.is_empty() {
            return Err(AppError::NoPendingLeads);
        }
        Ok(queue)
    }

    /// Stops scheduling further calls. A call already in flight completes.
    ///
    /// Pausing a paused session is a no-op.
    pub async fn pause(&self) -> Result<BulkProgress, AppError> {
        let mut session = self.inner.session.lock().await;

        match session.phase {
            Phase::Running => {
                session.phase = Phase::Paused;
                session.cancel_pending();
                self.inner.publish(&session);

                info!(
                    "[BULK] Paused at {}/{}",
                    session.current_index, session.total
                );
                self.inner.notifier.info(
                    "Bulk call paused",
                    format!("Paused after {} of {} calls", session.current_index, session.total),
                );
            }
            Phase::Paused => debug!("[BULK] Already paused"),
            Phase::Idle => {
                return Err(AppError::InvalidTransition {
                    action: "pause",
                    state: Phase::Idle.as_str(),
                })
            }
        }

        Ok(session.snapshot())
    }

    /// Continues a paused session with the next queued lead, right away.
    pub async fn resume(&self) -> Result<BulkProgress, AppError> {
        let mut session = self.inner.session.lock().await;

        if session.phase != Phase::Paused {
            return Err(AppError::InvalidTransition {
                action: "resume",
                state: session.phase.as_str(),
            });
        }

        session.phase = Phase::Running;
        self.inner.publish(&session);

        info!("[BULK] Resumed with {} remaining", session.queue.len());
        self.inner.notifier.info(
            "Bulk call resumed",
            format!("Resumed with {} calls remaining", session.queue.len()),
        );

        // The in-flight driver picks up the queue when its call returns
        if !session.in_flight {
            let driver = session.next_driver();
            tokio::spawn(process_next(Arc::clone(&self.inner), driver));
        }

        Ok(session.snapshot())
    }

    /// Ends the session. Leads not yet called stay pending.
    pub async fn cancel(&self) -> Result<BulkProgress, AppError> {
        let mut session = self.inner.session.lock().await;

        if session.phase == Phase::Idle {
            return Err(AppError::InvalidTransition {
                action: "cancel",
                state: Phase::Idle.as_str(),
            });
        }

        let skipped = session.queue.len();
        session.next_driver();
        session.cancel_pending();
        session.phase = Phase::Idle;
        session.queue.clear();
        session.current_index = 0;
        session.total = 0;
        session.in_flight = false;
        self.inner.publish(&session);

        info!("[BULK] Cancelled, {} leads not called", skipped);
        self.inner
            .notifier
            .info("Bulk call cancelled", "Bulk call cancelled");

        Ok(session.snapshot())
    }

    /// Places a single call outside of any session.
    ///
    /// # Errors
    ///
    /// `BulkCallInProgress` while a session exists, `LeadNotFound` for an
    /// unknown lead, `LeadAlreadyCalled` for a lead that was reached,
    /// otherwise the call's own error.
    pub async fn call_one(&self, lead_id: &str) -> Result<PlacedCall, AppError> {
        {
            let session = self.inner.session.lock().await;
            if session.phase != Phase::Idle {
                return Err(AppError::BulkCallInProgress);
            }
        }

        let lead = self
            .inner
            .leads
            .get(lead_id)
            .await
            .ok_or_else(|| AppError::LeadNotFound(lead_id.to_string()))?;
        if lead.status == LeadStatus::Called {
            return Err(AppError::LeadAlreadyCalled(lead_id.to_string()));
        }

        let outcome = self.inner.invoker.place_call(&lead).await;
        self.inner.record_outcome(&lead, &outcome).await;
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Places the next queued call and schedules its continuation.
///
/// Returns a boxed future because the continuation spawns this function
/// again.
fn process_next(inner: Arc<Inner>, driver: u64) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let lead = {
            let mut session = inner.session.lock().await;
            if session.driver != driver || session.phase != Phase::Running || session.in_flight {
                debug!("[BULK] Stale driver {} skipped", driver);
                return;
            }
            session.pending = None;

            let Some(lead) = session.queue.pop_front() else {
                return;
            };
            session.in_flight = true;
            inner.publish(&session);
            lead
        };

        info!("[BULK] Calling lead {}", lead.id);
        let outcome = inner.invoker.place_call(&lead).await;
        inner.record_outcome(&lead, &outcome).await;

        let mut session = inner.session.lock().await;
        if session.driver != driver {
            debug!("[BULK] Result for lead {} arrived after cancel", lead.id);
            return;
        }

        session.in_flight = false;
        session.current_index += 1;

        if session.queue.is_empty() {
            session.phase = Phase::Idle;
            inner.publish(&session);

            info!("[BULK] Session completed: {} calls", session.total);
            inner.notifier.success(
                "Bulk call completed",
                format!("Completed all {} calls", session.total),
            );
            return;
        }

        inner.publish(&session);

        if session.phase == Phase::Paused {
            debug!("[BULK] Paused, not scheduling lead {}", session.current_index + 1);
            return;
        }

        let token = CancellationToken::new();
        session.pending = Some(token.clone());
        let delay = session.delay;
        let next = Arc::clone(&inner);
        drop(session);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => process_next(next, driver).await,
            }
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leads::NewLead;
    use crate::notify::Notification;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::{mpsc, Semaphore};
    use tokio::time::Instant;

    /// Scriptable invoker recording when each lead was called.
    struct FakeInvoker {
        configured: AtomicBool,
        failing: HashSet<String>,
        latency: Duration,
        /// When set, each call waits for one permit before returning.
        gate: Option<Arc<Semaphore>>,
        calls: std::sync::Mutex<Vec<(String, Instant)>>,
    }

    impl FakeInvoker {
        fn new() -> Self {
            Self {
                configured: AtomicBool::new(true),
                failing: HashSet::new(),
                latency: Duration::ZERO,
                gate: None,
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn failing_for(mut self, phone: &str) -> Self {
            self.failing.insert(phone.to_string());
            self
        }

        fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        fn gated(mut self, gate: Arc<Semaphore>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn called_phones(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
        }
    }

    impl CallInvoker for FakeInvoker {
        fn is_configured<'a>(
            &'a self,
        ) -> Pin<Box<dyn Future<Output = Result<bool, AppError>> + Send + 'a>> {
            Box::pin(async move { Ok(self.configured.load(Ordering::SeqCst)) })
        }

        fn place_call<'a>(
            &'a self,
            lead: &'a Lead,
        ) -> Pin<Box<dyn Future<Output = Result<PlacedCall, AppError>> + Send + 'a>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((lead.phone_number.clone(), Instant::now()));

                if !self.latency.is_zero() {
                    tokio::time::sleep(self.latency).await;
                }
                if let Some(gate) = &self.gate {
                    gate.acquire().await.unwrap().forget();
                }

                if self.failing.contains(&lead.phone_number) {
                    return Err(AppError::UpstreamServer);
                }
                Ok(PlacedCall {
                    id: format!("req-{}", lead.phone_number),
                    from: None,
                    to: Some(lead.phone_number.clone()),
                    queue_position: Some(1),
                })
            })
        }
    }

    struct Harness {
        dispatcher: BulkDispatcher,
        invoker: Arc<FakeInvoker>,
        leads: LeadStore,
        notifications: mpsc::UnboundedReceiver<Notification>,
        ids: Vec<String>,
    }

    async fn harness(invoker: FakeInvoker, phones: &[&str]) -> Harness {
        let leads = LeadStore::new();
        let mut ids = Vec::new();
        for phone in phones {
            let lead = leads
                .add(NewLead {
                    first_name: "Lead".to_string(),
                    last_name: phone.to_string(),
                    email: None,
                    phone_number: phone.to_string(),
                })
                .await
                .unwrap();
            ids.push(lead.id);
        }

        let invoker = Arc::new(invoker);
        let (notifier, notifications) = Notifier::channel();
        let dispatcher = BulkDispatcher::new(invoker.clone(), leads.clone(), notifier);

        Harness {
            dispatcher,
            invoker,
            leads,
            notifications,
            ids,
        }
    }

    impl Harness {
        async fn status(&self, index: usize) -> LeadStatus {
            self.leads.get(&self.ids[index]).await.unwrap().status
        }

        async fn wait_until(&self, done: impl FnMut(&BulkProgress) -> bool) {
            let mut rx = self.dispatcher.subscribe();
            rx.wait_for(done).await.unwrap();
        }

        fn drain(&mut self) -> Vec<Notification> {
            let mut out = Vec::new();
            while let Ok(n) = self.notifications.try_recv() {
                out.push(n);
            }
            out
        }
    }

    const DELAY: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn processes_every_lead_once_in_list_order() {
        let h = harness(FakeInvoker::new(), &["1", "2", "3", "4"]).await;
        let selection = vec![h.ids[2].clone(), h.ids[0].clone(), h.ids[3].clone(), h.ids[1].clone()];

        let started = h.dispatcher.start(&selection, DELAY).await.unwrap();
        assert!(started.in_progress);
        assert_eq!(started.total, 4);
        assert_eq!(started.current_index, 0);

        h.wait_until(|p| !p.in_progress).await;

        assert_eq!(h.invoker.called_phones(), vec!["1", "2", "3", "4"]);
        let progress = h.dispatcher.progress();
        assert_eq!(progress.current_index, 4);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.remaining, 0);
        for i in 0..4 {
            assert_eq!(h.status(i).await, LeadStatus::Called);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn first_call_is_immediate_and_delay_follows_completion() {
        let h = harness(
            FakeInvoker::new().with_latency(Duration::from_secs(2)),
            &["1", "2", "3"],
        )
        .await;
        let t0 = Instant::now();

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| !p.in_progress).await;

        let offsets: Vec<Duration> = h.invoker.call_times().iter().map(|t| *t - t0).collect();
        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_secs(7),
                Duration::from_secs(14)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_and_non_pending_selections_are_skipped() {
        let h = harness(FakeInvoker::new(), &["1", "2", "3"]).await;
        h.leads.mark_called(&h.ids[1], "earlier").await;

        let selection = vec![h.ids[0].clone(), h.ids[1].clone(), h.ids[0].clone(), h.ids[2].clone()];
        let started = h.dispatcher.start(&selection, DELAY).await.unwrap();
        assert_eq!(started.total, 2);

        h.wait_until(|p| !p.in_progress).await;
        assert_eq!(h.invoker.called_phones(), vec!["1", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_keep_queue_and_index() {
        let h = harness(FakeInvoker::new(), &["1", "2", "3"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.current_index == 1).await;

        let paused = h.dispatcher.pause().await.unwrap();
        assert!(paused.paused);
        assert!(paused.in_progress);
        assert_eq!(paused.current_index, 1);
        assert_eq!(paused.remaining, 2);

        // Nothing happens while paused
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.invoker.called_phones(), vec!["1"]);

        // Second pause is a no-op
        assert_eq!(h.dispatcher.pause().await.unwrap(), paused);

        let resumed = h.dispatcher.resume().await.unwrap();
        assert!(!resumed.paused);
        assert_eq!(resumed.current_index, 1);
        assert_eq!(resumed.remaining, 2);

        h.wait_until(|p| !p.in_progress).await;
        assert_eq!(h.invoker.called_phones(), vec!["1", "2", "3"]);
        assert_eq!(h.dispatcher.progress().current_index, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_places_next_call_immediately() {
        let h = harness(FakeInvoker::new(), &["1", "2"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.current_index == 1).await;
        h.dispatcher.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let resumed_at = Instant::now();
        h.dispatcher.resume().await.unwrap();
        h.wait_until(|p| !p.in_progress).await;

        assert_eq!(h.invoker.call_times()[1], resumed_at);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_does_not_abort_call_in_flight() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(FakeInvoker::new().gated(gate.clone()), &["1", "2", "3"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.remaining == 2).await;

        h.dispatcher.pause().await.unwrap();
        gate.add_permits(1);
        h.wait_until(|p| p.current_index == 1).await;

        assert_eq!(h.status(0).await, LeadStatus::Called);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.invoker.called_phones(), vec!["1"]);
        assert!(h.dispatcher.progress().paused);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_during_call_in_flight_does_not_double_dial() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(FakeInvoker::new().gated(gate.clone()), &["1", "2"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.remaining == 1).await;

        h.dispatcher.pause().await.unwrap();
        h.dispatcher.resume().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.invoker.called_phones(), vec!["1"]);

        gate.add_permits(2);
        h.wait_until(|p| !p.in_progress).await;
        assert_eq!(h.invoker.called_phones(), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_leaves_unprocessed_leads_pending() {
        let h = harness(FakeInvoker::new(), &["1", "2", "3"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.current_index == 1).await;

        let cancelled = h.dispatcher.cancel().await.unwrap();
        assert_eq!(cancelled, BulkProgress {
            delay_secs: 5,
            ..BulkProgress::default()
        });

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.invoker.called_phones(), vec!["1"]);
        assert_eq!(h.status(0).await, LeadStatus::Called);
        assert_eq!(h.status(1).await, LeadStatus::Pending);
        assert_eq!(h.status(2).await, LeadStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_paused_returns_to_idle() {
        let h = harness(FakeInvoker::new(), &["1", "2"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.current_index == 1).await;
        h.dispatcher.pause().await.unwrap();

        let cancelled = h.dispatcher.cancel().await.unwrap();
        assert!(!cancelled.in_progress);
        assert!(!cancelled.paused);
        assert_eq!(cancelled.remaining, 0);
        assert_eq!(h.status(1).await, LeadStatus::Pending);

        assert!(matches!(
            h.dispatcher.resume().await,
            Err(AppError::InvalidTransition { action: "resume", .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn late_result_after_cancel_updates_lead_only() {
        let gate = Arc::new(Semaphore::new(0));
        let h = harness(FakeInvoker::new().gated(gate.clone()), &["1", "2"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| p.remaining == 1).await;
        h.dispatcher.cancel().await.unwrap();

        gate.add_permits(1);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(h.status(0).await, LeadStatus::Called);
        assert_eq!(h.status(1).await, LeadStatus::Pending);
        assert_eq!(h.dispatcher.progress(), BulkProgress {
            delay_secs: 5,
            ..BulkProgress::default()
        });
    }

    #[tokio::test(start_paused = true)]
    async fn failed_call_does_not_halt_queue() {
        let h = harness(
            FakeInvoker::new().failing_for("2"),
            &["1", "2", "3"],
        )
        .await;
        let t0 = Instant::now();

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| !p.in_progress).await;

        assert_eq!(h.status(0).await, LeadStatus::Called);
        assert_eq!(h.status(1).await, LeadStatus::Failed);
        assert_eq!(h.status(2).await, LeadStatus::Called);
        assert_eq!(h.invoker.call_times()[2] - t0, Duration::from_secs(10));
        assert_eq!(h.dispatcher.progress().current_index, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_refusals_notify_once_and_change_nothing() {
        let mut h = harness(FakeInvoker::new(), &["1"]).await;
        h.leads.mark_failed(&h.ids[0]).await;

        let err = h.dispatcher.start(&[], DELAY).await.unwrap_err();
        assert!(matches!(err, AppError::NoLeadsSelected));

        let err = h.dispatcher.start(&h.ids, DELAY).await.unwrap_err();
        assert!(matches!(err, AppError::NoPendingLeads));

        h.invoker.configured.store(false, Ordering::SeqCst);
        let err = h.dispatcher.start(&h.ids, DELAY).await.unwrap_err();
        assert!(matches!(err, AppError::NoCampaignSelected));

        let notifications = h.drain();
        assert_eq!(notifications.len(), 3);
        assert!(notifications
            .iter()
            .all(|n| n.level == NotificationLevel::Warning));

        assert_eq!(h.dispatcher.progress(), BulkProgress::default());
        assert!(h.invoker.called_phones().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_refused_while_session_exists() {
        let h = harness(FakeInvoker::new(), &["1", "2"]).await;

        h.dispatcher.start(&h.ids[..1], DELAY).await.unwrap();
        h.dispatcher.pause().await.unwrap();

        let err = h.dispatcher.start(&h.ids[1..], DELAY).await.unwrap_err();
        assert!(matches!(err, AppError::BulkCallInProgress));
        assert!(matches!(
            h.dispatcher.call_one(&h.ids[1]).await,
            Err(AppError::BulkCallInProgress)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn transitions_from_idle_are_rejected() {
        let h = harness(FakeInvoker::new(), &[]).await;

        for result in [
            h.dispatcher.pause().await,
            h.dispatcher.resume().await,
            h.dispatcher.cancel().await,
        ] {
            assert!(matches!(
                result,
                Err(AppError::InvalidTransition { state: "idle", .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn session_notifications_follow_the_run() {
        let mut h = harness(FakeInvoker::new().failing_for("2"), &["1", "2"]).await;

        h.dispatcher.start(&h.ids, DELAY).await.unwrap();
        h.wait_until(|p| !p.in_progress).await;

        let titles: Vec<String> = h.drain().into_iter().map(|n| n.title).collect();
        assert_eq!(
            titles,
            vec![
                "Bulk call started",
                "Call started",
                "Call failed",
                "Bulk call completed"
            ]
        );
    }

    #[tokio::test]
    async fn call_one_records_outcome() {
        let h = harness(FakeInvoker::new().failing_for("2"), &["1", "2"]).await;

        let placed = h.dispatcher.call_one(&h.ids[0]).await.unwrap();
        assert_eq!(placed.id, "req-1");
        assert_eq!(
            h.leads.get(&h.ids[0]).await.unwrap().call_id.as_deref(),
            Some("req-1")
        );

        assert!(h.dispatcher.call_one(&h.ids[1]).await.is_err());
        assert_eq!(h.status(1).await, LeadStatus::Failed);

        assert!(matches!(
            h.dispatcher.call_one("missing").await,
            Err(AppError::LeadNotFound(_))
        ));
    }

    #[tokio::test]
    async fn call_one_refuses_called_lead() {
        let h = harness(FakeInvoker::new().failing_for("1"), &["1"]).await;
        h.leads.mark_called(&h.ids[0], "earlier").await;

        assert!(matches!(
            h.dispatcher.call_one(&h.ids[0]).await,
            Err(AppError::LeadAlreadyCalled(_))
        ));
        assert!(h.invoker.called_phones().is_empty());
        assert_eq!(h.status(0).await, LeadStatus::Called);
        assert_eq!(
            h.leads.get(&h.ids[0]).await.unwrap().call_id.as_deref(),
            Some("earlier")
        );
    }
}
