use hls_player_types::StateField;

use super::epoch::Epoch;
use super::errors::{PlayerError, PlayerResult, SinkError};
use super::inner::PlayerInnerHolder;
use super::scheduler;
use super::sink::SinkState;
use super::spawn::spawn;

#[derive(Debug, Clone, Copy, PartialEq)]
enum SeekPlan {
	/// The target is already buffered, only the current time moves.
	Cheap,
	/// Discard the buffer and reload from the segment containing the target.
	Hard { begin: f64 },
}

/// Moves playback to `time`, reloading the buffer unless the target is already buffered.
#[tracing::instrument(skip(inner))]
pub async fn seek_to_time(inner: &PlayerInnerHolder, time: f64, force_reload: bool) -> PlayerResult<()> {
	let (target, plan) = {
		let inner = inner.borrow();
		if inner.destroyed {
			return Err(PlayerError::Cancelled);
		}

		let media = inner
			.manifest
			.as_ref()
			.and_then(|store| store.media())
			.ok_or(PlayerError::NoSource)?;

		let time = if time.is_finite() { time } else { 0.0 };
		let target = time.min(media.total_duration() - inner.settings.seek_end_margin_secs).max(0.0);

		let plan = if inner.state.is_buffered(target) && !force_reload {
			SeekPlan::Cheap
		} else {
			let begin = media
				.segment_containing(target)
				.map(|s| s.start_time)
				.unwrap_or(inner.state.begin_load_time);
			SeekPlan::Hard { begin }
		};

		(target, plan)
	};

	inner.platform().surface.set_current_time(target);

	match plan {
		SeekPlan::Cheap => {
			cheap_seek(inner, target);
			Ok(())
		}
		SeekPlan::Hard { begin } => hard_seek(inner, target, begin).await,
	}
}

fn cheap_seek(inner: &PlayerInnerHolder, target: f64) {
	tracing::trace!(target, "seeking inside the buffered range");

	let notify = {
		let mut inner = inner.borrow_mut();
		let mut fields = vec![StateField::CurrentTime];

		inner.state.current_time = target;
		if inner.state.seeking {
			inner.state.seeking = false;
			fields.push(StateField::Seeking);
		}

		inner.notify_state(&fields)
	};

	notify();
}

async fn hard_seek(inner: &PlayerInnerHolder, target: f64, begin: f64) -> PlayerResult<()> {
	let (epoch, notify) = {
		let mut inner = inner.borrow_mut();
		let epoch = inner.epoch.bump();
		let aborted = inner.fetches.abort_all();

		tracing::debug!(%epoch, target, begin, aborted, "reloading buffer");

		let mut fields = vec![StateField::CurrentTime];
		inner.state.current_time = target;
		if !inner.state.seeking {
			inner.state.seeking = true;
			fields.push(StateField::Seeking);
		}

		(epoch, inner.notify_state(&fields))
	};

	notify();

	let notify = {
		let mut inner = inner.borrow_mut();
		inner.state.begin_load_time = begin;
		inner.state.end_load_time = begin;
		inner.notify_state(&[StateField::BeginLoadTime, StateField::EndLoadTime])
	};

	notify();

	let platform = inner.platform();
	let sink = platform.sink.sink();

	if sink.ready_state() == SinkState::Ended {
		let codecs = inner.borrow().settings.codecs.clone();
		tracing::debug!("sink has ended, reopening");
		sink.reopen(&codecs).await?;
		inner.ensure_current(epoch)?;
	}

	if sink.ready_state() != SinkState::Open {
		tracing::warn!(state = ?sink.ready_state(), "sink is not open, cannot reload");
		return Err(SinkError::NotOpen.into());
	}

	sink.abort()?;
	platform.pipeline.rebase(begin);
	sink.set_timestamp_offset(begin)?;

	inner.borrow_mut().epoch.set_first_append(Box::new(move |inner| finish_seek(inner, epoch)));

	scheduler::start(inner, epoch);

	Ok(())
}

fn finish_seek(inner: &PlayerInnerHolder, epoch: Epoch) {
	let target = inner.borrow().state.current_time;
	inner.platform().surface.set_current_time(target);

	let notify = {
		let mut inner = inner.borrow_mut();
		if !inner.epoch.is_current(epoch) || !inner.state.seeking {
			return;
		}

		inner.state.seeking = false;
		inner.notify_state(&[StateField::Seeking])
	};

	notify();
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TimeUpdate {
	Ignore,
	Mirror(f64),
	Seek(f64, bool),
}

/// Reconciles the surface position with the buffered range.
///
/// Inside the range the position is mirrored into the state. If the scheduler stopped
/// after a segment that playback has now reached, a forced reload slightly ahead is
/// started. Outside the range (and not already seeking) a seek is started.
pub fn on_time_update(inner: &PlayerInnerHolder) {
	let time = inner.platform().surface.current_time();

	let action = {
		let inner = inner.borrow();
		let media = inner.manifest.as_ref().and_then(|store| store.media());

		match media {
			None => TimeUpdate::Ignore,
			_ if inner.destroyed => TimeUpdate::Ignore,
			Some(media) if inner.state.is_buffered(time) => {
				let drained = inner
					.epoch
					.partial()
					.filter(|partial| partial.finished)
					.and_then(|partial| media.get(partial.segment))
					.is_some_and(|segment| time > segment.start_time);

				if drained && !inner.state.seeking {
					TimeUpdate::Seek(time + inner.settings.force_reload_lead_secs, true)
				} else if inner.state.current_time != time {
					TimeUpdate::Mirror(time)
				} else {
					TimeUpdate::Ignore
				}
			}
			Some(_) if !inner.state.seeking => TimeUpdate::Seek(time, false),
			Some(_) => TimeUpdate::Ignore,
		}
	};

	match action {
		TimeUpdate::Ignore => {}
		TimeUpdate::Mirror(time) => {
			let notify = {
				let mut inner = inner.borrow_mut();
				inner.state.current_time = time;
				inner.notify_state(&[StateField::CurrentTime])
			};

			notify();
		}
		TimeUpdate::Seek(time, force_reload) => {
			tracing::debug!(time, force_reload, "time update left the buffered range");

			let inner = inner.clone();
			spawn(async move {
				if let Err(err) = seek_to_time(&inner, time, force_reload).await {
					if !err.is_cancelled() {
						tracing::error!("seek from time update failed: {err}");
					}
				}
			});
		}
	}
}

/// Mirrors the surface's volume and muted flags into the state.
pub fn on_volume_change(inner: &PlayerInnerHolder) {
	let platform = inner.platform();
	let (volume, muted) = (platform.surface.volume(), platform.surface.muted());

	let notify = {
		let mut inner = inner.borrow_mut();
		let mut fields = Vec::with_capacity(2);

		if inner.state.volume != volume {
			inner.state.volume = volume;
			fields.push(StateField::Volume);
		}

		if inner.state.muted != muted {
			inner.state.muted = muted;
			fields.push(StateField::Muted);
		}

		if fields.is_empty() {
			return;
		}

		inner.notify_state(&fields)
	};

	notify();
}
