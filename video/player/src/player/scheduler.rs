use bytes::Bytes;

use super::epoch::Epoch;
use super::errors::{PlayerError, PlayerResult};
use super::events::dispatch;
use super::fetch::FetchRequest;
use super::inner::{PlayerInner, PlayerInnerHolder, PlayerInnerWeakHolder};
use super::manifest::{self, Segment};
use super::sink::SinkState;
use super::spawn::{sleep, spawn};

// Float slack when comparing accumulated load times against segment start times.
const TIME_EPSILON: f64 = 1e-6;

#[derive(Debug)]
enum Admission {
	/// No more segments in the manifest.
	Done,
	Skip,
	/// Outside both the look-ahead window and the buffer cap.
	Stop,
	Load(Segment, Option<Bytes>),
}

fn admit(inner: &PlayerInner, epoch: Epoch, index: usize) -> PlayerResult<Admission> {
	if !inner.epoch.is_current(epoch) || inner.epoch.loaded().generation() != epoch {
		return Err(PlayerError::Cancelled);
	}

	let media = inner
		.manifest
		.as_ref()
		.and_then(|store| store.media())
		.ok_or(PlayerError::NoSource)?;

	let Some(segment) = media.get(index) else {
		return Ok(Admission::Done);
	};

	if inner.epoch.is_finished() {
		return Ok(Admission::Done);
	}

	if inner.epoch.loaded().contains(index) || segment.start_time + TIME_EPSILON < inner.state.end_load_time {
		return Ok(Admission::Skip);
	}

	let within_lookahead = segment.start_time < inner.state.current_time + inner.settings.lookahead_secs;
	let under_cap = inner.state.buffered_span() <= inner.settings.max_buffer_secs;

	if within_lookahead || under_cap {
		Ok(Admission::Load(segment.clone(), inner.epoch.cached_bytes(index)))
	} else {
		Ok(Admission::Stop)
	}
}

async fn fetch_segment(inner: &PlayerInnerHolder, epoch: Epoch, segment: &Segment) -> PlayerResult<Bytes> {
	let (url, retries, abort) = {
		let mut inner = inner.borrow_mut();
		let url = inner
			.manifest
			.as_ref()
			.ok_or(PlayerError::NoSource)?
			.segment_url(segment)?;

		let retries = inner.settings.max_retries;
		(url, retries, inner.fetches.register(segment.index, epoch))
	};

	let result = FetchRequest::new(url)
		.retries(retries)
		.epoch_guard(epoch)
		.abort_handle(abort)
		.send(inner)
		.await;

	inner.borrow_mut().fetches.release(segment.index, epoch);
	let bytes = result?;

	let filter = inner.borrow().events.bytes_filter();
	match filter {
		Some(filter) => Ok(filter(segment.clone(), bytes.clone()).await.unwrap_or(bytes)),
		None => Ok(bytes),
	}
}

/// One scheduling pass over the manifest, in index order.
#[tracing::instrument(skip(inner), fields(%epoch))]
pub async fn run_once(inner: &PlayerInnerHolder, epoch: Epoch) -> PlayerResult<()> {
	let mut index = 0;

	loop {
		let admission = admit(&inner.borrow(), epoch, index)?;

		let (segment, cached) = match admission {
			Admission::Done => return Ok(()),
			Admission::Skip => {
				index += 1;
				continue;
			}
			Admission::Stop => {
				tracing::trace!(index, "buffer is full, pausing");
				inner.borrow_mut().epoch.finish_partial();
				return Ok(());
			}
			Admission::Load(segment, cached) => (segment, cached),
		};

		let bytes = match cached {
			Some(bytes) => {
				tracing::trace!(index, "reusing cached segment bytes");
				bytes
			}
			None => fetch_segment(inner, epoch, &segment).await?,
		};

		inner.ensure_current(epoch)?;
		inner.platform().pipeline.push(inner, epoch, &segment, bytes).await?;

		index += 1;
	}
}

fn report(inner: &PlayerInnerHolder, err: &PlayerError) {
	if err.is_cancelled() {
		return;
	}

	tracing::error!("scheduler pass failed: {err}");
	if !err.is_surfaced() {
		if let Some(event) = err.event_error(false) {
			dispatch!(inner.borrow_mut().events.emit(event));
		}
	}
}

/// Ends the stream when a refresh turned the manifest terminal after its last
/// segment was already appended.
fn end_if_complete(inner: &PlayerInnerHolder, epoch: Epoch) -> PlayerResult<()> {
	let complete = {
		let inner = inner.borrow();
		if !inner.epoch.is_current(epoch) {
			return Ok(());
		}

		inner
			.manifest
			.as_ref()
			.and_then(|store| store.media())
			.is_some_and(|media| {
				media.is_terminal() && media.len().checked_sub(1).map_or(true, |last| inner.epoch.loaded().contains(last))
			})
	};

	let platform = inner.platform();
	let sink = platform.sink.sink();
	if complete && sink.ready_state() == SinkState::Open {
		tracing::debug!("manifest became terminal, ending stream");
		sink.end_of_stream()?;
	}

	Ok(())
}

/// Spawns the scheduling loop for `epoch`. The loop exits once the epoch goes stale,
/// the sink stops being open, or the player is dropped.
pub fn start(inner: &PlayerInnerHolder, epoch: Epoch) {
	spawn(run(inner.downgrade(), epoch));
}

#[tracing::instrument(skip(inner), fields(%epoch))]
async fn run(inner: PlayerInnerWeakHolder, epoch: Epoch) {
	tracing::debug!("scheduler started");

	loop {
		let Some(strong) = inner.upgrade() else {
			return;
		};

		match run_once(&strong, epoch).await {
			Ok(()) => {
				let live = strong
					.borrow()
					.manifest
					.as_ref()
					.and_then(|store| store.media())
					.is_some_and(|media| !media.is_terminal());

				if live && strong.borrow().epoch.is_current(epoch) {
					match manifest::refresh(&strong, epoch).await {
						Ok(()) => {
							if let Err(err) = end_if_complete(&strong, epoch) {
								report(&strong, &err);
							}
						}
						Err(err) => report(&strong, &err),
					}
				}
			}
			Err(err) => report(&strong, &err),
		}

		if !strong.borrow().epoch.is_current(epoch) {
			tracing::debug!("scheduler stopped, epoch is stale");
			return;
		}

		let interval = strong.borrow().settings.scheduler_interval();
		drop(strong);

		sleep(interval).await;

		let Some(strong) = inner.upgrade() else {
			return;
		};

		if !strong.borrow().epoch.is_current(epoch) {
			tracing::debug!("scheduler stopped, epoch is stale");
			return;
		}

		if strong.platform().sink.sink().ready_state() != SinkState::Open {
			tracing::debug!("scheduler stopped, sink is no longer open");
			return;
		}
	}
}
