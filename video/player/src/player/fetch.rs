use std::collections::HashMap;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::epoch::Epoch;
use super::errors::{EventError, FetchError, PlayerError, PlayerResult};
use super::events::dispatch;
use super::inner::PlayerInnerHolder;
use super::spawn::sleep;

/// Cancels an in-flight request. Cancelling is idempotent.
pub type AbortHandle = CancellationToken;

#[derive(Debug, Clone)]
pub struct HttpResponse {
	pub status: u16,
	pub body: Bytes,
}

impl HttpResponse {
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Transport used for manifest and segment requests.
///
/// Requests are plain GETs that must bypass any cache. Implementations should stop
/// the request when `abort` is cancelled; the caller also races the returned future
/// against it.
#[async_trait::async_trait(?Send)]
pub trait HttpClient {
	async fn get(&self, url: &Url, abort: &AbortHandle) -> Result<HttpResponse, FetchError>;
}

/// Abort handles of segment requests, keyed by segment index.
#[derive(Debug, Default)]
pub struct InflightFetches {
	handles: HashMap<usize, (Epoch, AbortHandle)>,
}

impl InflightFetches {
	pub fn register(&mut self, index: usize, epoch: Epoch) -> AbortHandle {
		let handle = AbortHandle::new();
		if let Some((_, previous)) = self.handles.insert(index, (epoch, handle.clone())) {
			previous.cancel();
		}

		handle
	}

	/// Drops the handle for `index` unless a newer epoch has claimed it in the meantime.
	pub fn release(&mut self, index: usize, epoch: Epoch) {
		if self.handles.get(&index).is_some_and(|(e, _)| *e == epoch) {
			self.handles.remove(&index);
		}
	}

	pub fn abort_all(&mut self) -> usize {
		let count = self.handles.len();
		for (_, (_, handle)) in self.handles.drain() {
			handle.cancel();
		}

		count
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}
}

pub struct FetchRequest {
	url: Url,
	retries: u32,
	guard: Option<Epoch>,
	abort: AbortHandle,
}

impl FetchRequest {
	pub fn new(url: Url) -> Self {
		Self {
			url,
			retries: 0,
			guard: None,
			abort: AbortHandle::new(),
		}
	}

	pub fn retries(mut self, retries: u32) -> Self {
		self.retries = retries;
		self
	}

	/// Stop retrying once `epoch` is no longer current.
	pub fn epoch_guard(mut self, epoch: Epoch) -> Self {
		self.guard = Some(epoch);
		self
	}

	pub fn abort_handle(mut self, abort: AbortHandle) -> Self {
		self.abort = abort;
		self
	}

	fn is_stale(&self, inner: &PlayerInnerHolder) -> bool {
		self.guard.is_some_and(|epoch| !inner.borrow().epoch.is_current(epoch))
	}

	/// Fetches the body, retrying failures after a fixed backoff.
	///
	/// Every failed attempt is reported as a non-fatal error event. Aborts and stale
	/// epochs end the request immediately with [`PlayerError::Cancelled`] and are not
	/// reported.
	#[tracing::instrument(skip(self, inner), fields(url = %self.url))]
	pub async fn send(self, inner: &PlayerInnerHolder) -> PlayerResult<Bytes> {
		let client = inner.platform().client.clone();
		let backoff = inner.borrow().settings.retry_backoff();
		let mut retries = self.retries;

		loop {
			let result = tokio::select! {
				biased;
				_ = self.abort.cancelled() => Err(FetchError::Aborted),
				result = client.get(&self.url, &self.abort) => result.and_then(|response| {
					if response.is_success() {
						Ok(response.body)
					} else {
						Err(FetchError::StatusCode(response.status))
					}
				}),
			};

			let err = match result {
				Ok(body) => return Ok(body),
				Err(err) => err,
			};

			if err == FetchError::Aborted || self.is_stale(inner) {
				tracing::trace!("request cancelled");
				return Err(PlayerError::Cancelled);
			}

			tracing::warn!(retries, "request failed: {err}");
			dispatch!(inner.borrow_mut().events.emit(EventError::from(err.clone())));

			if retries == 0 {
				return Err(err.into());
			}

			retries -= 1;

			tokio::select! {
				biased;
				_ = self.abort.cancelled() => return Err(PlayerError::Cancelled),
				_ = sleep(backoff) => {}
			}

			if self.is_stale(inner) {
				return Err(PlayerError::Cancelled);
			}
		}
	}
}
