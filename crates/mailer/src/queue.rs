use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use leadneedle_core::config::MailerConfig;

use crate::job::EmailJob;
use crate::transport::{MailMessage, MailTransport, TransportError};

#[derive(Clone, Debug)]
pub struct DeliveryQueueConfig {
    pub poll_interval: Duration,
    pub backoff_base: Duration,
    pub shutdown_grace: Duration,
}

impl Default for DeliveryQueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            backoff_base: Duration::from_secs(1),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DeliveryQueueConfig {
    pub fn from_config(config: &MailerConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            shutdown_grace: Duration::from_secs(config.shutdown_grace_secs),
        }
    }
}

/// Point-in-time counters; approximate under concurrent mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueStats {
    pub queued_total: u64,
    pub sent_total: u64,
    pub failed_total: u64,
    pub current_depth: usize,
    pub worker_alive: bool,
}

/// Explicitly owned delivery queue. Construct one per process, share it via
/// `Arc`, and call `shutdown` exactly once at teardown.
pub struct DeliveryQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    jobs: Mutex<VecDeque<EmailJob>>,
    /// Governs whether the worker loop keeps going. The `JoinHandle` is the
    /// source of truth for whether a worker exists at all.
    running: AtomicBool,
    in_flight: AtomicUsize,
    queued_total: AtomicU64,
    sent_total: AtomicU64,
    failed_total: AtomicU64,
    transport: Arc<dyn MailTransport>,
    config: DeliveryQueueConfig,
}

impl DeliveryQueue {
    pub fn new(transport: Arc<dyn MailTransport>, config: DeliveryQueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                jobs: Mutex::new(VecDeque::new()),
                running: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                queued_total: AtomicU64::new(0),
                sent_total: AtomicU64::new(0),
                failed_total: AtomicU64::new(0),
                transport,
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Appends the job and returns immediately; never blocks on delivery.
    /// Worker liveness is re-checked on every call so a crashed worker is
    /// replaced the next time anything is enqueued.
    pub fn enqueue(&self, job: EmailJob) {
        let depth = {
            let mut jobs = self.shared.jobs.lock().expect("job queue lock poisoned");
            jobs.push_back(job);
            jobs.len()
        };
        self.shared.queued_total.fetch_add(1, Ordering::SeqCst);
        debug!(event_name = "mailer.queue.enqueued", depth, "email job queued");

        self.ensure_worker();
    }

    fn ensure_worker(&self) {
        let mut worker = self.worker.lock().expect("worker lock poisoned");
        let alive = worker.as_ref().is_some_and(|handle| !handle.is_finished());
        if alive {
            return;
        }

        if worker.is_some() {
            warn!(
                event_name = "mailer.worker.restarted",
                "previous delivery worker was dead, starting a replacement"
            );
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        *worker = Some(tokio::spawn(worker_loop(shared)));
    }

    pub fn stats(&self) -> QueueStats {
        let current_depth = self.shared.jobs.lock().expect("job queue lock poisoned").len();
        let worker_alive = self
            .worker
            .lock()
            .expect("worker lock poisoned")
            .as_ref()
            .is_some_and(|handle| !handle.is_finished());

        QueueStats {
            queued_total: self.shared.queued_total.load(Ordering::SeqCst),
            sent_total: self.shared.sent_total.load(Ordering::SeqCst),
            failed_total: self.shared.failed_total.load(Ordering::SeqCst),
            current_depth,
            worker_alive,
        }
    }

    /// Blocks until every queued job has reached a terminal state or the
    /// timeout elapses. Shutdown/test path only; request handlers never wait.
    pub async fn drain_and_wait(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let depth = self.shared.jobs.lock().expect("job queue lock poisoned").len();
            let in_flight = self.shared.in_flight.load(Ordering::SeqCst);
            if depth == 0 && in_flight == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    event_name = "mailer.queue.drain_timeout",
                    depth,
                    in_flight,
                    "drain timed out with work remaining"
                );
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Stops the worker after its current attempt completes, bounded by the
    /// configured grace period. Returns whether the worker exited cleanly;
    /// on timeout the task is aborted as best-effort cleanup.
    pub async fn shutdown(&self) -> bool {
        self.shared.running.store(false, Ordering::SeqCst);

        let handle = self.worker.lock().expect("worker lock poisoned").take();
        let Some(mut handle) = handle else {
            return true;
        };

        match tokio::time::timeout(self.shared.config.shutdown_grace, &mut handle).await {
            Ok(_) => {
                info!(event_name = "mailer.worker.stopped", "delivery worker stopped");
                true
            }
            Err(_) => {
                handle.abort();
                warn!(
                    event_name = "mailer.worker.abort",
                    "delivery worker did not stop within grace period, aborting"
                );
                false
            }
        }
    }
}

async fn worker_loop(shared: Arc<Shared>) {
    info!(event_name = "mailer.worker.started", "delivery worker processing queue");

    while shared.running.load(Ordering::SeqCst) {
        // The in-flight flag is raised under the queue lock so drain
        // callers can never observe "empty and idle" mid-handoff.
        let next = {
            let mut jobs = shared.jobs.lock().expect("job queue lock poisoned");
            let job = jobs.pop_front();
            if job.is_some() {
                shared.in_flight.store(1, Ordering::SeqCst);
            }
            job
        };

        let Some(job) = next else {
            tokio::time::sleep(shared.config.poll_interval).await;
            continue;
        };

        // Guard, not a bare store: the flag must clear even if an attempt
        // panics, or drain callers would wait on a job nobody owns.
        let _in_flight = InFlightGuard(&shared.in_flight);
        let kind = job.kind;
        let recipient = job.recipient.clone();
        let delivered = deliver_with_retries(&shared, job).await;

        if delivered {
            shared.sent_total.fetch_add(1, Ordering::SeqCst);
            info!(
                event_name = "mailer.delivery.sent",
                kind = kind.as_str(),
                recipient = %recipient,
                "email delivered"
            );
        } else {
            shared.failed_total.fetch_add(1, Ordering::SeqCst);
            error!(
                event_name = "mailer.delivery.failed",
                kind = kind.as_str(),
                recipient = %recipient,
                "email delivery exhausted"
            );
        }
    }

    info!(event_name = "mailer.worker.loop_exit", "delivery worker loop exited");
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

/// Runs the attempt sequence for one job. Terminal errors stop immediately;
/// transient errors back off exponentially until the attempt budget runs
/// out. The backoff sleep intentionally holds the single worker, so a job
/// under retry delays jobs behind it.
async fn deliver_with_retries(shared: &Arc<Shared>, mut job: EmailJob) -> bool {
    while job.attempt_count < job.max_attempts {
        job.attempt_count += 1;
        debug!(
            event_name = "mailer.delivery.attempt",
            kind = job.kind.as_str(),
            recipient = %job.recipient,
            attempt = job.attempt_count,
            max_attempts = job.max_attempts,
            "starting delivery attempt"
        );

        match attempt_once(shared.transport.as_ref(), &job).await {
            Ok(()) => return true,
            Err(error) if error.is_terminal() => {
                warn!(
                    event_name = "mailer.delivery.terminal_error",
                    kind = job.kind.as_str(),
                    recipient = %job.recipient,
                    attempt = job.attempt_count,
                    error = %error,
                    "terminal delivery error, not retrying"
                );
                return false;
            }
            Err(error) => {
                warn!(
                    event_name = "mailer.delivery.transient_error",
                    kind = job.kind.as_str(),
                    recipient = %job.recipient,
                    attempt = job.attempt_count,
                    error = %error,
                    "transient delivery error"
                );
                if job.attempt_count >= job.max_attempts {
                    return false;
                }
                let backoff = shared.config.backoff_base * 2u32.saturating_pow(job.attempt_count);
                tokio::time::sleep(backoff).await;
            }
        }
    }

    false
}

/// One full try: fresh session, authenticate, submit, close. A submit that
/// reports refused recipients counts as a terminal failure, not a success.
async fn attempt_once(
    transport: &dyn MailTransport,
    job: &EmailJob,
) -> Result<(), TransportError> {
    use secrecy::ExposeSecret;

    let mut session = transport.connect().await?;

    let result = async {
        session.authenticate(&job.sender.address, job.sender.secret.expose_secret()).await?;
        let message = MailMessage::from_job(job);
        let refused = session.submit(&message).await?;
        if !refused.is_empty() {
            return Err(TransportError::RecipientsRefused { recipients: refused });
        }
        Ok(())
    }
    .await;

    // Close failures after a decided attempt are logged, never escalated.
    if let Err(error) = session.close().await {
        debug!(
            event_name = "mailer.session.close_failed",
            error = %error,
            "session close failed"
        );
    }

    result
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::job::{EmailJob, EmailKind, SenderIdentity};
    use crate::transport::{MailMessage, MailSession, MailTransport, TransportError};

    use super::{DeliveryQueue, DeliveryQueueConfig};

    #[derive(Clone, Copy, Debug)]
    enum ScriptedOutcome {
        Deliver,
        Refuse,
        FailAuth,
        FailTransient,
        Panic,
    }

    /// Transport double whose per-attempt behavior is scripted up front.
    /// `attempts` counts sessions opened; `delivered` records acceptance
    /// order.
    struct ScriptedTransport {
        script: Mutex<VecDeque<ScriptedOutcome>>,
        fallback: ScriptedOutcome,
        attempts: AtomicU32,
        delivered: Arc<Mutex<Vec<String>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedTransport {
        fn always(outcome: ScriptedOutcome) -> Arc<Self> {
            Self::build(Vec::new(), outcome, None)
        }

        fn scripted(outcomes: Vec<ScriptedOutcome>, fallback: ScriptedOutcome) -> Arc<Self> {
            Self::build(outcomes, fallback, None)
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Self::build(Vec::new(), ScriptedOutcome::Deliver, Some(gate))
        }

        fn build(
            outcomes: Vec<ScriptedOutcome>,
            fallback: ScriptedOutcome,
            gate: Option<Arc<Notify>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(outcomes.into()),
                fallback,
                attempts: AtomicU32::new(0),
                delivered: Arc::new(Mutex::new(Vec::new())),
                gate,
            })
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().expect("delivered lock").clone()
        }
    }

    #[async_trait]
    impl MailTransport for ScriptedTransport {
        async fn connect(&self) -> Result<Box<dyn MailSession>, TransportError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let outcome =
                self.script.lock().expect("script lock").pop_front().unwrap_or(self.fallback);
            if matches!(outcome, ScriptedOutcome::Panic) {
                panic!("scripted worker death");
            }
            Ok(Box::new(ScriptedSession { outcome, delivered: Arc::clone(&self.delivered) }))
        }
    }

    struct ScriptedSession {
        outcome: ScriptedOutcome,
        delivered: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MailSession for ScriptedSession {
        async fn authenticate(
            &mut self,
            _identity: &str,
            _secret: &str,
        ) -> Result<(), TransportError> {
            match self.outcome {
                ScriptedOutcome::FailAuth => {
                    Err(TransportError::Auth("bad credentials".to_string()))
                }
                _ => Ok(()),
            }
        }

        async fn submit(&mut self, message: &MailMessage) -> Result<Vec<String>, TransportError> {
            match self.outcome {
                ScriptedOutcome::Deliver => {
                    self.delivered.lock().expect("delivered lock").push(message.to.clone());
                    Ok(Vec::new())
                }
                ScriptedOutcome::Refuse => Ok(vec![message.to.clone()]),
                ScriptedOutcome::FailTransient => {
                    Err(TransportError::Connection("connection reset".to_string()))
                }
                ScriptedOutcome::FailAuth => {
                    Err(TransportError::Auth("bad credentials".to_string()))
                }
                ScriptedOutcome::Panic => unreachable!("panic happens at connect"),
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn fast_config() -> DeliveryQueueConfig {
        DeliveryQueueConfig {
            poll_interval: Duration::from_millis(5),
            backoff_base: Duration::from_millis(1),
            shutdown_grace: Duration::from_millis(500),
        }
    }

    fn job(recipient: &str) -> EmailJob {
        EmailJob::new(
            EmailKind::Notification,
            recipient,
            "subject",
            "<p>body</p>",
            SenderIdentity {
                address: "robot@example.com".to_string(),
                secret: "pw".to_string().into(),
            },
        )
    }

    #[tokio::test]
    async fn empty_queue_drains_immediately() {
        let transport = ScriptedTransport::always(ScriptedOutcome::Deliver);
        let queue = DeliveryQueue::new(transport, fast_config());

        assert!(queue.drain_and_wait(Duration::from_millis(50)).await);
        let stats = queue.stats();
        assert_eq!(stats.queued_total, 0);
        assert!(!stats.worker_alive, "worker starts lazily on first enqueue");
    }

    #[tokio::test]
    async fn every_enqueued_job_reaches_a_terminal_outcome() {
        let transport = ScriptedTransport::scripted(
            vec![
                ScriptedOutcome::Deliver,
                ScriptedOutcome::FailAuth,
                ScriptedOutcome::Deliver,
                ScriptedOutcome::Refuse,
            ],
            ScriptedOutcome::Deliver,
        );
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        for index in 0..5 {
            queue.enqueue(job(&format!("lead{index}@example.com")));
        }

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        let stats = queue.stats();
        assert_eq!(stats.sent_total + stats.failed_total, 5);
        assert_eq!(stats.queued_total, 5);
        assert_eq!(stats.current_depth, 0);

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn transient_failures_retry_exactly_max_attempts_then_fail() {
        let transport = ScriptedTransport::always(ScriptedOutcome::FailTransient);
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        queue.enqueue(job("lead@example.com"));

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        let stats = queue.stats();
        assert_eq!(stats.failed_total, 1);
        assert_eq!(stats.sent_total, 0);
        assert_eq!(transport.attempts(), 3, "default budget is three attempts");

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn auth_failure_is_terminal_after_one_attempt() {
        let transport = ScriptedTransport::always(ScriptedOutcome::FailAuth);
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        queue.enqueue(job("lead@example.com"));

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        let stats = queue.stats();
        assert_eq!(stats.failed_total, 1);
        assert_eq!(transport.attempts(), 1, "auth failures must not retry");

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn refused_recipients_fail_without_retry() {
        let transport = ScriptedTransport::always(ScriptedOutcome::Refuse);
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        queue.enqueue(job("refused@example.com"));

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        let stats = queue.stats();
        assert_eq!(stats.failed_total, 1);
        assert_eq!(stats.sent_total, 0, "a refused recipient is not a silent success");
        assert_eq!(transport.attempts(), 1);

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn transient_then_success_recovers_within_budget() {
        let transport = ScriptedTransport::scripted(
            vec![ScriptedOutcome::FailTransient, ScriptedOutcome::Deliver],
            ScriptedOutcome::Deliver,
        );
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        queue.enqueue(job("lead@example.com"));

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        let stats = queue.stats();
        assert_eq!(stats.sent_total, 1);
        assert_eq!(stats.failed_total, 0);
        assert_eq!(transport.attempts(), 2);

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn jobs_deliver_in_enqueue_order() {
        let transport = ScriptedTransport::always(ScriptedOutcome::Deliver);
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        for index in 0..4 {
            queue.enqueue(job(&format!("lead{index}@example.com")));
        }

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        assert_eq!(
            transport.delivered(),
            vec![
                "lead0@example.com".to_string(),
                "lead1@example.com".to_string(),
                "lead2@example.com".to_string(),
                "lead3@example.com".to_string(),
            ]
        );

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn concurrent_enqueues_never_lose_jobs() {
        let gate = Arc::new(Notify::new());
        let transport = ScriptedTransport::gated(gate.clone());
        let queue = Arc::new(DeliveryQueue::new(transport.clone(), fast_config()));

        // First job parks the worker inside connect so nothing else
        // dequeues while the producers run.
        queue.enqueue(job("sentinel@example.com"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut producers = Vec::new();
        for index in 0..16 {
            let queue = Arc::clone(&queue);
            producers.push(tokio::spawn(async move {
                queue.enqueue(job(&format!("lead{index}@example.com")));
            }));
        }
        for producer in producers {
            producer.await.expect("producer task");
        }

        let stats = queue.stats();
        assert_eq!(stats.queued_total, 17);
        assert_eq!(stats.current_depth, 16, "all concurrent enqueues must be visible");

        // Notify permits do not accumulate, so keep releasing until the
        // queue reports empty.
        let release = tokio::spawn({
            let gate = gate.clone();
            async move {
                loop {
                    gate.notify_one();
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        });
        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        release.abort();
        let stats = queue.stats();
        assert_eq!(stats.sent_total, 17);

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn dead_worker_is_replaced_on_next_enqueue() {
        let transport = ScriptedTransport::scripted(
            vec![ScriptedOutcome::Panic],
            ScriptedOutcome::Deliver,
        );
        let queue = DeliveryQueue::new(transport.clone(), fast_config());

        queue.enqueue(job("doomed@example.com"));
        // Give the panicking worker time to die.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!queue.stats().worker_alive, "panicked worker should be observed dead");

        queue.enqueue(job("survivor@example.com"));
        assert!(queue.stats().worker_alive, "enqueue must restart a dead worker");

        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        assert_eq!(transport.delivered(), vec!["survivor@example.com".to_string()]);

        assert!(queue.shutdown().await);
    }

    #[tokio::test]
    async fn shutdown_stops_worker_and_reports_clean_exit() {
        let transport = ScriptedTransport::always(ScriptedOutcome::Deliver);
        let queue = DeliveryQueue::new(transport, fast_config());

        queue.enqueue(job("lead@example.com"));
        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);

        assert!(queue.shutdown().await, "idle worker should exit within grace");
        assert!(!queue.stats().worker_alive);
    }
}
