//! Client-side retry queue for throttled API calls.
//!
//! Requests go out directly while the queue is idle. The first HTTP 429 moves the queue into the
//! limited phase: the throttled request and every request issued afterwards are parked, and a
//! single drain task waits out the `Retry-After` delay before replaying them in arrival order. A
//! replay that hits 429 again returns to the head of the queue and the queue waits once more.
//! Each caller receives the eventual response of its own request.

mod signal;
mod state;

pub use signal::*;
pub use state::*;

// crates.io
use tokio::{sync::oneshot, task::JoinHandle};
// self
use crate::{_prelude::*, obs, obs::QueueEvent};

type ReplayFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;
type Replay<T, E> = Box<dyn Fn() -> ReplayFuture<T, E> + Send>;
type Responder<T, E> = oneshot::Sender<Result<T, QueueError<E>>>;
type Pending<T, E> = oneshot::Receiver<Result<T, QueueError<E>>>;

/// Retry queue settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryQueueConfig {
	/// Delay used when a 429 carries no usable `Retry-After`.
	pub fallback_retry_after: Duration,
	/// Upper bound applied to any server-provided delay.
	pub max_retry_after: Duration,
	/// Sends allowed per request, the first one included.
	pub max_attempts: u32,
}
impl RetryQueueConfig {
	/// Default delay for a 429 without `Retry-After`.
	pub const DEFAULT_FALLBACK_RETRY_AFTER: Duration = Duration::seconds(30);
	/// Default cap on server-provided delays.
	pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::minutes(5);
	/// Default per-request attempt budget.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

	/// Overrides the attempt budget; zero is treated as one.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts.max(1);

		self
	}

	/// Overrides the fallback delay.
	pub fn with_fallback_retry_after(mut self, delay: Duration) -> Self {
		self.fallback_retry_after = delay;

		self
	}

	fn delay_for(&self, hint: Option<Duration>) -> Duration {
		hint.unwrap_or(self.fallback_retry_after).clamp(Duration::ZERO, self.max_retry_after)
	}
}
impl Default for RetryQueueConfig {
	fn default() -> Self {
		Self {
			fallback_retry_after: Self::DEFAULT_FALLBACK_RETRY_AFTER,
			max_retry_after: Self::DEFAULT_MAX_RETRY_AFTER,
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
		}
	}
}

/// Failure returned to a queued caller.
#[derive(Debug, ThisError)]
pub enum QueueError<E> {
	/// The queue was cleared before the request completed.
	#[error("Request was cancelled because the retry queue was cleared.")]
	Cancelled,
	/// The request kept receiving 429 responses.
	#[error("Request was still rate limited after {attempts} attempts.")]
	RetriesExhausted {
		/// Sends performed, the first one included.
		attempts: u32,
	},
	/// The request itself failed.
	#[error(transparent)]
	Request(E),
}

/// Queue that parks and replays requests while the upstream API is throttling.
///
/// Cloning yields another handle to the same queue.
pub struct RetryQueue<T, E> {
	shared: Arc<Shared<T, E>>,
}
impl<T, E> RetryQueue<T, E>
where
	T: 'static + Send + RateLimitSignal,
	E: 'static + Send,
{
	/// Creates an idle queue.
	pub fn new(config: RetryQueueConfig) -> Self {
		Self {
			shared: Arc::new(Shared { config, inner: Mutex::new(QueueInner::default()) }),
		}
	}

	/// Active configuration.
	pub fn config(&self) -> &RetryQueueConfig {
		&self.shared.config
	}

	/// Sends `request`, or parks it when the queue is limited, and resolves with its eventual
	/// response.
	///
	/// `request` must be replayable: it is invoked once per attempt.
	pub async fn execute<F, Fut>(&self, request: F) -> Result<T, QueueError<E>>
	where
		F: 'static + Send + Fn() -> Fut,
		Fut: 'static + Send + Future<Output = Result<T, E>>,
	{
		let replay: Replay<T, E> = Box::new(move || -> ReplayFuture<T, E> { Box::pin(request()) });
		let replay = match self.shared.park_if_limited(replay) {
			Ok(receiver) => return await_response(receiver).await,
			Err(replay) => replay,
		};

		let attempt = replay();
		let response = match attempt.await {
			Ok(response) => response,
			Err(e) => return Err(QueueError::Request(e)),
		};

		if !response.is_rate_limited() {
			return Ok(response);
		}

		let delay = self.shared.config.delay_for(response.retry_after(OffsetDateTime::now_utc()));

		if self.shared.config.max_attempts <= 1 {
			obs::record_queue_event(QueueEvent::Exhausted);

			return Err(QueueError::RetriesExhausted { attempts: 1 });
		}

		let receiver = self.shared.park_throttled(replay, delay);

		await_response(receiver).await
	}

	/// Rejects every parked request (and the one being replayed) with
	/// [`QueueError::Cancelled`] and returns the queue to idle.
	///
	/// Returns the number of requests cancelled.
	pub fn clear_queue(&self) -> usize {
		let mut inner = self.shared.inner.lock();
		let mut cancelled = 0;

		for parked in inner.queue.drain(..) {
			let _ = parked.responder.send(Err(QueueError::Cancelled));

			cancelled += 1;
		}
		if let Some(in_flight) = inner.in_flight.take() {
			let _ = in_flight.responder.send(Err(QueueError::Cancelled));

			cancelled += 1;
		}

		if let Some(drain) = inner.drain.take() {
			drain.abort();
		}

		inner.phase = QueuePhase::Idle;
		inner.retry_after = Duration::ZERO;
		inner.generation = inner.generation.wrapping_add(1);

		drop(inner);
		obs::record_queue_event(QueueEvent::Cleared);
		obs::debug_transition("retry_queue", &format_args!("cleared {cancelled} request(s)"));

		cancelled
	}

	/// Snapshot of the queue.
	pub fn state(&self) -> RateLimitState {
		let inner = self.shared.inner.lock();
		let phase = inner.phase;
		let is_limited = phase != QueuePhase::Idle;
		let retry_after_seconds =
			if is_limited { inner.retry_after.whole_seconds().max(0) as u64 } else { 0 };

		RateLimitState {
			phase,
			is_limited,
			retry_after_seconds,
			queue_len: inner.queue.len() + usize::from(inner.in_flight.is_some()),
		}
	}
}
impl<T, E> Clone for RetryQueue<T, E> {
	fn clone(&self) -> Self {
		Self { shared: self.shared.clone() }
	}
}
impl<T, E> Debug for RetryQueue<T, E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let inner = self.shared.inner.lock();

		f.debug_struct("RetryQueue")
			.field("config", &self.shared.config)
			.field("phase", &inner.phase)
			.field("queue_len", &inner.queue.len())
			.finish()
	}
}

struct Shared<T, E> {
	config: RetryQueueConfig,
	inner: Mutex<QueueInner<T, E>>,
}
impl<T, E> Shared<T, E>
where
	T: 'static + Send + RateLimitSignal,
	E: 'static + Send,
{
	/// Parks `replay` unless the queue is idle, in which case it is handed back to be sent.
	fn park_if_limited(&self, replay: Replay<T, E>) -> Result<Pending<T, E>, Replay<T, E>> {
		let mut inner = self.inner.lock();

		if inner.phase == QueuePhase::Idle {
			return Err(replay);
		}

		let (responder, receiver) = oneshot::channel();

		inner.queue.push_back(Parked { replay, responder, attempts: 0 });
		obs::record_queue_event(QueueEvent::Enqueued);

		Ok(receiver)
	}

	fn park_throttled(self: &Arc<Self>, replay: Replay<T, E>, delay: Duration) -> Pending<T, E> {
		let (responder, receiver) = oneshot::channel();
		let mut inner = self.inner.lock();

		if inner.phase == QueuePhase::Idle {
			obs::record_queue_event(QueueEvent::Limited);
			obs::debug_transition("retry_queue", &"idle -> limited");
		}

		inner.phase = QueuePhase::Limited;
		inner.retry_after = delay;
		inner.queue.push_back(Parked { replay, responder, attempts: 1 });

		if inner.drain.is_none() {
			inner.drain = Some(tokio::spawn(drain(self.clone(), inner.generation)));
		}

		receiver
	}

	/// Ends the drain task when nothing is parked or the queue was cleared since it started;
	/// otherwise returns the delay to wait.
	fn next_wait(&self, generation: u64) -> Option<Duration> {
		let mut inner = self.inner.lock();

		if inner.generation != generation {
			return None;
		}
		if inner.queue.is_empty() {
			inner.phase = QueuePhase::Idle;
			inner.drain = None;

			return None;
		}

		Some(inner.retry_after)
	}

	fn begin_draining(&self, generation: u64) -> bool {
		let mut inner = self.inner.lock();

		if inner.generation != generation {
			return false;
		}

		inner.phase = QueuePhase::Draining;
		obs::debug_transition("retry_queue", &"limited -> draining");

		true
	}

	fn pop_next(&self, generation: u64) -> Option<Replay<T, E>> {
		let mut inner = self.inner.lock();

		if inner.generation != generation {
			return None;
		}

		let Some(Parked { replay, responder, attempts }) = inner.queue.pop_front() else {
			inner.phase = QueuePhase::Idle;
			obs::debug_transition("retry_queue", &"draining -> idle");

			return None;
		};

		inner.in_flight = Some(InFlight { responder, attempts: attempts + 1 });

		Some(replay)
	}

	/// Delivers the outcome of a replay; returns `false` when draining must pause.
	fn settle(&self, replay: Replay<T, E>, generation: u64, result: Result<T, E>) -> bool {
		let mut inner = self.inner.lock();

		// Cleared while the replay was in flight; its caller was already rejected.
		if inner.generation != generation {
			return false;
		}

		let Some(InFlight { responder, attempts }) = inner.in_flight.take() else { return false };

		match result {
			Ok(response) if response.is_rate_limited() => {
				inner.phase = QueuePhase::Limited;
				inner.retry_after =
					self.config.delay_for(response.retry_after(OffsetDateTime::now_utc()));

				if attempts >= self.config.max_attempts {
					let _ = responder.send(Err(QueueError::RetriesExhausted { attempts }));

					obs::record_queue_event(QueueEvent::Exhausted);
				} else {
					inner.queue.push_front(Parked { replay, responder, attempts });
					obs::record_queue_event(QueueEvent::Requeued);
				}

				obs::debug_transition("retry_queue", &"draining -> limited");

				false
			},
			Ok(response) => {
				let _ = responder.send(Ok(response));

				obs::record_queue_event(QueueEvent::Replayed);

				true
			},
			Err(e) => {
				let _ = responder.send(Err(QueueError::Request(e)));

				true
			},
		}
	}
}

struct QueueInner<T, E> {
	phase: QueuePhase,
	retry_after: Duration,
	queue: VecDeque<Parked<T, E>>,
	in_flight: Option<InFlight<T, E>>,
	drain: Option<JoinHandle<()>>,
	generation: u64,
}
impl<T, E> Default for QueueInner<T, E> {
	fn default() -> Self {
		Self {
			phase: QueuePhase::Idle,
			retry_after: Duration::ZERO,
			queue: VecDeque::new(),
			in_flight: None,
			drain: None,
			generation: 0,
		}
	}
}

struct Parked<T, E> {
	replay: Replay<T, E>,
	responder: Responder<T, E>,
	attempts: u32,
}

struct InFlight<T, E> {
	responder: Responder<T, E>,
	attempts: u32,
}

/// Single drain task, bound to the queue generation it was spawned in.
async fn drain<T, E>(shared: Arc<Shared<T, E>>, generation: u64)
where
	T: 'static + Send + RateLimitSignal,
	E: 'static + Send,
{
	while let Some(delay) = shared.next_wait(generation) {
		tokio::time::sleep(std::time::Duration::try_from(delay).unwrap_or_default()).await;

		if !shared.begin_draining(generation) {
			return;
		}

		while let Some(replay) = shared.pop_next(generation) {
			let attempt = replay();
			let result = attempt.await;

			if !shared.settle(replay, generation, result) {
				break;
			}
		}
	}
}

async fn await_response<T, E>(receiver: Pending<T, E>) -> Result<T, QueueError<E>> {
	receiver.await.unwrap_or(Err(QueueError::Cancelled))
}
