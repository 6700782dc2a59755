use std::rc::Rc;

use hls_player_types::{PlaybackState, StateField};
use url::Url;

use self::epoch::Epoch;
use self::errors::{PlayerError, PlayerResult};
use self::events::{dispatch, EventType, ListenerId, PlayerEvent, SegmentBytesFilter};
use self::inner::{Platform, PlayerInner, PlayerInnerHolder};
use self::sink::{MediaSink, SinkState};
use self::surface::SurfaceEvent;

pub mod epoch;
pub mod errors;
pub mod events;
pub mod fetch;
pub mod inner;
pub mod manifest;
pub mod scheduler;
pub mod seek;
pub mod settings;
pub mod sink;
pub mod spawn;
pub mod surface;
pub mod transmux;

pub use self::settings::PlayerSettings;

/// An HLS player that fetches, transmuxes and buffers segments into a [`MediaSink`].
///
/// All work runs on the current thread. On native targets the player must be driven
/// from inside a [`tokio::task::LocalSet`].
#[derive(Clone)]
pub struct Player {
	inner: PlayerInnerHolder,
}

impl Player {
	pub fn new(settings: PlayerSettings, platform: Platform) -> PlayerResult<Self> {
		settings.validate()?;

		let surface = platform.surface.clone();
		surface.set_autoplay(settings.autoplay);
		surface.set_controls(settings.controls);
		surface.set_muted(settings.muted);

		let inner = PlayerInner::new(settings, surface.volume());
		let player = Self {
			inner: PlayerInnerHolder::new(inner, platform),
		};

		dispatch!(player.inner.borrow_mut().notify_state(&StateField::ALL));

		Ok(player)
	}

	/// Whether the sink can accept the container described by `mime`.
	pub fn is_supported(sink: &dyn MediaSink, mime: &str) -> bool {
		sink.is_type_supported(mime)
	}

	pub fn on(&self, event: EventType, f: impl Fn(&PlayerEvent) + 'static) -> ListenerId {
		self.inner.borrow_mut().events.add_event_listener(event, Rc::new(f), false)
	}

	pub fn once(&self, event: EventType, f: impl Fn(&PlayerEvent) + 'static) -> ListenerId {
		self.inner.borrow_mut().events.add_event_listener(event, Rc::new(f), true)
	}

	pub fn off(&self, event: EventType, id: ListenerId) {
		self.inner.borrow_mut().events.remove_event_listener(event, id);
	}

	/// Installs a hook that may rewrite the bytes of every fetched segment.
	pub fn set_segment_bytes_filter(&self, filter: Option<SegmentBytesFilter>) {
		self.inner.borrow_mut().events.set_bytes_filter(filter);
	}

	pub fn state(&self) -> PlaybackState {
		self.inner.borrow().state.clone()
	}

	pub fn settings(&self) -> PlayerSettings {
		self.inner.borrow().settings.clone()
	}

	pub fn epoch(&self) -> Epoch {
		self.inner.borrow().epoch.current()
	}

	/// Loads a new source. Any work for the previous source is cancelled.
	///
	/// Failures other than cancellation are reported as fatal error events.
	#[tracing::instrument(skip(self))]
	pub async fn set_source(&self, src: &str) -> PlayerResult<()> {
		let result = self.load_source(src).await;

		if let Err(err) = &result {
			if !err.is_cancelled() && !err.is_surfaced() {
				tracing::error!("failed to load source: {err}");
				if let Some(event) = err.event_error(true) {
					dispatch!(self.inner.borrow_mut().events.emit(event));
				}
			}
		}

		result
	}

	async fn load_source(&self, src: &str) -> PlayerResult<()> {
		let url = Url::parse(src)?;
		let platform = self.inner.platform();
		let volume = platform.surface.volume();

		let (epoch, notify) = {
			let mut inner = self.inner.borrow_mut();
			let epoch = inner.epoch.bump_for_source();
			inner.fetches.abort_all();
			inner.destroyed = false;
			inner.manifest = Some(manifest::ManifestStore::new(url));
			inner.state = PlaybackState::new(!inner.settings.autoplay, inner.settings.muted, volume);

			(epoch, inner.notify_state(&StateField::ALL))
		};

		notify();
		platform.pipeline.reset();

		let sink = platform.sink.sink();
		if sink.ready_state() == SinkState::Open {
			sink.end_of_stream()?;
		}

		sink.open().await?;
		self.inner.ensure_current(epoch)?;

		let codecs = self.inner.borrow().settings.codecs.clone();
		if !sink.is_type_supported(&codecs) {
			tracing::error!(%codecs, "container type is not supported by the sink");
			let err = PlayerError::UnsupportedFormat(codecs);
			if let Some(event) = err.event_error(true) {
				dispatch!(self.inner.borrow_mut().events.emit(event));
			}
			return Err(err);
		}

		sink.add_buffer_handle(&codecs)?;
		dispatch!(self.inner.borrow_mut().events.emit(PlayerEvent::Init));

		manifest::load(&self.inner, epoch).await?;
		self.inner.ensure_current(epoch)?;

		let (empty, terminal) = {
			let inner = self.inner.borrow();
			let media = inner
				.manifest
				.as_ref()
				.and_then(|store| store.media())
				.ok_or(PlayerError::NoSource)?;

			(media.is_empty(), media.is_terminal())
		};

		if empty && terminal {
			tracing::debug!("manifest has no segments, ending stream");
			sink.end_of_stream()?;
			return Ok(());
		}

		seek::seek_to_time(&self.inner, 0.0, false).await
	}

	pub async fn seek_to_time(&self, time: f64, force_reload: bool) -> PlayerResult<()> {
		seek::seek_to_time(&self.inner, time, force_reload).await
	}

	pub async fn play(&self) -> PlayerResult<()> {
		self.inner.platform().surface.play().await.map_err(PlayerError::Playback)?;
		self.set_paused(false);
		Ok(())
	}

	pub async fn pause(&self) -> PlayerResult<()> {
		self.inner.platform().surface.pause().await.map_err(PlayerError::Playback)?;
		self.set_paused(true);
		Ok(())
	}

	fn set_paused(&self, paused: bool) {
		let notify = {
			let mut inner = self.inner.borrow_mut();
			if inner.state.paused == paused {
				return;
			}

			inner.state.paused = paused;
			inner.notify_state(&[StateField::Paused])
		};

		notify();
	}

	/// Forwards a notification from the playback surface.
	pub fn handle_surface_event(&self, event: SurfaceEvent) {
		match event {
			SurfaceEvent::TimeUpdate => seek::on_time_update(&self.inner),
			SurfaceEvent::VolumeChange => seek::on_volume_change(&self.inner),
		}
	}

	/// Stops all work. In-flight tasks observe the new epoch and exit.
	pub fn destroy(&self) {
		let aborted = {
			let mut inner = self.inner.borrow_mut();
			inner.destroyed = true;
			inner.epoch.bump();
			inner.fetches.abort_all()
		};

		tracing::debug!(aborted, "player destroyed");

		let platform = self.inner.platform();
		let sink = platform.sink.sink();
		if sink.ready_state() == SinkState::Open {
			if let Err(err) = sink.abort() {
				tracing::warn!("failed to abort sink: {err}");
			}
		}
	}

	pub fn is_destroyed(&self) -> bool {
		self.inner.borrow().destroyed
	}

	#[cfg(test)]
	pub(crate) fn inner(&self) -> &PlayerInnerHolder {
		&self.inner
	}
}
