use std::cell::Cell;
use std::rc::Rc;

use bytes::Bytes;
use hls_player_types::StateField;
use tokio::sync::Mutex;

use super::epoch::Epoch;
use super::errors::{PlayerError, PlayerResult, SinkError};
use super::events::{dispatch, PlayerEvent, SegmentEvent};
use super::inner::PlayerInnerHolder;
use super::manifest::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
	Closed,
	Open,
	Ended,
}

/// The platform media buffer the transmuxed bytes are appended to.
///
/// At most one append may be in flight at a time, `append_buffer` resolves once the
/// append has completed.
#[async_trait::async_trait(?Send)]
pub trait MediaSink {
	/// Opens the sink, resolving when it is ready to accept a buffer handle.
	async fn open(&self) -> Result<(), SinkError>;

	fn is_type_supported(&self, mime: &str) -> bool;

	fn add_buffer_handle(&self, mime: &str) -> Result<(), SinkError>;

	async fn append_buffer(&self, data: Bytes) -> Result<(), SinkError>;

	/// Aborts the current append. A pending `append_buffer` must resolve afterwards.
	fn abort(&self) -> Result<(), SinkError>;

	fn set_timestamp_offset(&self, seconds: f64) -> Result<(), SinkError>;

	fn set_duration(&self, seconds: f64) -> Result<(), SinkError>;

	fn end_of_stream(&self) -> Result<(), SinkError>;

	/// Replaces an ended sink with a fresh open one carrying a new buffer handle.
	async fn reopen(&self, mime: &str) -> Result<(), SinkError>;

	fn ready_state(&self) -> SinkState;
}

/// Serializes appends into the sink and records completed segments.
pub struct SinkCoordinator {
	sink: Rc<dyn MediaSink>,
	append_lock: Mutex<()>,
	in_flight: Cell<bool>,
}

impl SinkCoordinator {
	pub fn new(sink: Rc<dyn MediaSink>) -> Self {
		Self {
			sink,
			append_lock: Mutex::new(()),
			in_flight: Cell::new(false),
		}
	}

	pub fn sink(&self) -> &Rc<dyn MediaSink> {
		&self.sink
	}

	pub fn is_appending(&self) -> bool {
		self.in_flight.get()
	}

	/// Appends `data` and waits for completion. Fails with [`PlayerError::Cancelled`] when
	/// `epoch` went stale while waiting for the lock or for the append itself.
	pub async fn append(&self, inner: &PlayerInnerHolder, epoch: Epoch, data: Bytes) -> PlayerResult<()> {
		let _guard = self.append_lock.lock().await;
		inner.ensure_current(epoch)?;

		if self.sink.ready_state() != SinkState::Open {
			return Err(SinkError::NotOpen.into());
		}

		self.in_flight.set(true);
		let result = self.sink.append_buffer(data).await;
		self.in_flight.set(false);

		match result {
			Ok(()) => inner.ensure_current(epoch),
			Err(_) if !inner.borrow().epoch.is_current(epoch) => Err(PlayerError::Cancelled),
			Err(err) => Err(err.into()),
		}
	}

	/// Bookkeeping once the last fragment of `segment` has been appended.
	pub fn complete_segment(
		&self,
		inner: &PlayerInnerHolder,
		epoch: Epoch,
		segment: &Segment,
		raw: Bytes,
		appended: usize,
	) -> PlayerResult<()> {
		let (first, callback, end_of_stream) = {
			let mut inner = inner.borrow_mut();
			if !inner.epoch.is_current(epoch) {
				return Err(PlayerError::Cancelled);
			}

			let first = inner.epoch.record_loaded(segment.index);
			inner.epoch.set_partial(segment.index, raw);
			inner.state.end_load_time += segment.duration;

			let callback = if first { inner.epoch.take_first_append() } else { None };
			let end_of_stream = inner
				.manifest
				.as_ref()
				.and_then(|store| store.media())
				.is_some_and(|media| media.is_terminal() && media.is_last(segment.index));

			(first, callback, end_of_stream)
		};

		tracing::debug!(segment = segment.index, first, "segment appended");

		dispatch!(inner.borrow_mut().notify_state(&[StateField::EndLoadTime]));

		let event = SegmentEvent {
			segment: segment.clone(),
			bytes: appended,
		};

		if first {
			if let Some(callback) = callback {
				callback(inner);
			}

			dispatch!(inner.borrow_mut().events.emit(PlayerEvent::FirstSegmentLoaded(event.clone())));
			dispatch!(inner.borrow_mut().events.emit(PlayerEvent::Ready));
		}

		dispatch!(inner.borrow_mut().events.emit(PlayerEvent::SegmentLoaded(event)));

		if end_of_stream && self.sink.ready_state() == SinkState::Open {
			tracing::debug!(segment = segment.index, "terminal segment appended, ending stream");
			self.sink.end_of_stream()?;
		}

		Ok(())
	}
}
