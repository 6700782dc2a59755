use std::collections::HashSet;

use hls_player_types::StateField;
use url::Url;

use super::epoch::Epoch;
use super::errors::{EventError, PlayerError, PlayerResult};
use super::events::{dispatch, ManifestSummary, PlayerEvent};
use super::fetch::FetchRequest;
use super::inner::PlayerInnerHolder;
use super::sink::SinkState;
use crate::hls::{master::MasterPlaylist, media::MediaPlaylist, Playlist};

/// A media segment along with its absolute position on the timeline.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
	pub index: usize,
	pub uri: String,
	pub duration: f64,
	/// Sum of the durations of all preceding segments.
	pub start_time: f64,
}

impl Segment {
	pub fn end_time(&self) -> f64 {
		self.start_time + self.duration
	}
}

/// The merged segment list of the active media playlist.
#[derive(Debug, Clone, Default)]
pub struct MediaManifest {
	segments: Vec<Segment>,
	uris: HashSet<String>,
	end_list: bool,
	target_duration: u32,
}

impl MediaManifest {
	pub fn from_playlist(playlist: &MediaPlaylist) -> Self {
		let mut manifest = Self::default();
		manifest.merge(playlist);
		manifest
	}

	/// Appends segments whose uri has not been seen yet and recomputes start times.
	/// Returns the number of appended segments.
	pub fn merge(&mut self, playlist: &MediaPlaylist) -> usize {
		let before = self.segments.len();

		for segment in &playlist.segments {
			if self.uris.insert(segment.url.clone()) {
				self.segments.push(Segment {
					index: self.segments.len(),
					uri: segment.url.clone(),
					duration: segment.duration,
					start_time: 0.0,
				});
			}
		}

		self.end_list |= playlist.end_list;
		self.target_duration = playlist.target_duration;
		self.recompute_start_times();

		self.segments.len() - before
	}

	fn recompute_start_times(&mut self) {
		let mut start_time = 0.0;
		for segment in self.segments.iter_mut() {
			segment.start_time = start_time;
			start_time += segment.duration;
		}
	}

	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}

	pub fn get(&self, index: usize) -> Option<&Segment> {
		self.segments.get(index)
	}

	pub fn len(&self) -> usize {
		self.segments.len()
	}

	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// Whether the playlist carried `#EXT-X-ENDLIST`.
	pub fn is_terminal(&self) -> bool {
		self.end_list
	}

	pub fn is_last(&self, index: usize) -> bool {
		index + 1 == self.segments.len()
	}

	pub fn target_duration(&self) -> u32 {
		self.target_duration
	}

	pub fn total_duration(&self) -> f64 {
		self.segments.last().map(Segment::end_time).unwrap_or_default()
	}

	/// The segment whose `[start, end)` range contains `time`.
	pub fn segment_containing(&self, time: f64) -> Option<&Segment> {
		let idx = self.segments.partition_point(|s| s.end_time() <= time);
		self.segments.get(idx).filter(|s| s.start_time <= time)
	}
}

pub struct ManifestStore {
	master_url: Url,
	media_url: Option<Url>,
	master: Option<MasterPlaylist>,
	media: Option<MediaManifest>,
}

impl ManifestStore {
	pub fn new(master_url: Url) -> Self {
		Self {
			master_url,
			media_url: None,
			master: None,
			media: None,
		}
	}

	pub fn master_url(&self) -> &Url {
		&self.master_url
	}

	pub fn media_url(&self) -> Option<&Url> {
		self.media_url.as_ref()
	}

	pub fn master(&self) -> Option<&MasterPlaylist> {
		self.master.as_ref()
	}

	pub fn media(&self) -> Option<&MediaManifest> {
		self.media.as_ref()
	}

	pub fn segment_url(&self, segment: &Segment) -> PlayerResult<Url> {
		let base = self.media_url.as_ref().ok_or(PlayerError::NoSource)?;
		Ok(base.join(&segment.uri)?)
	}
}

async fn fetch_playlist(inner: &PlayerInnerHolder, epoch: Epoch, url: &Url) -> PlayerResult<Playlist> {
	let retries = inner.borrow().settings.max_retries;

	let body = FetchRequest::new(url.clone())
		.retries(retries)
		.epoch_guard(epoch)
		.send(inner)
		.await?;

	inner.ensure_current(epoch)?;

	match Playlist::try_from(body.as_ref()) {
		Ok(playlist) => Ok(playlist),
		Err(err) => {
			tracing::error!(%url, "failed to parse playlist: {err}");
			let err = PlayerError::ManifestParse(err);
			if let Some(event) = err.event_error(false) {
				dispatch!(inner.borrow_mut().events.emit(event));
			}
			Err(err)
		}
	}
}

fn summary(url: &Url, playlist: &Playlist) -> ManifestSummary {
	match playlist {
		Playlist::Master(master) => ManifestSummary {
			url: url.to_string(),
			master: true,
			renditions: master.streams.len(),
			segments: 0,
			end_list: false,
			target_duration: None,
		},
		Playlist::Media(media) => ManifestSummary {
			url: url.to_string(),
			master: false,
			renditions: 0,
			segments: media.segments.len(),
			end_list: media.end_list,
			target_duration: Some(media.target_duration),
		},
	}
}

/// Loads the master playlist and then the media playlist of its first rendition.
///
/// A playlist without renditions is treated as the media playlist itself, starting out
/// empty and non-terminal until a refresh yields segments.
#[tracing::instrument(skip(inner), fields(%epoch))]
pub async fn load(inner: &PlayerInnerHolder, epoch: Epoch) -> PlayerResult<()> {
	let master_url = {
		let inner = inner.borrow();
		let store = inner.manifest.as_ref().ok_or(PlayerError::NoSource)?;
		if store.master.is_some() || store.media.is_some() {
			return Ok(());
		}

		store.master_url.clone()
	};

	let playlist = fetch_playlist(inner, epoch, &master_url).await?;
	dispatch!(inner
		.borrow_mut()
		.events
		.emit(PlayerEvent::ManifestParsed(summary(&master_url, &playlist))));

	match playlist {
		Playlist::Master(master) => {
			let Some(stream) = master.streams.first() else {
				tracing::debug!("master playlist has no renditions, using it as the media playlist");

				if let Some(store) = inner.borrow_mut().manifest.as_mut() {
					store.media_url = Some(master_url);
					store.media = Some(MediaManifest::default());
					store.master = Some(master);
				}

				return Ok(());
			};

			let media_url = master_url.join(&stream.uri)?;
			tracing::debug!(%media_url, renditions = master.streams.len(), "selected first rendition");

			if let Some(store) = inner.borrow_mut().manifest.as_mut() {
				store.media_url = Some(media_url);
				store.master = Some(master);
			}

			refresh(inner, epoch).await
		}
		Playlist::Media(media) => {
			if let Some(store) = inner.borrow_mut().manifest.as_mut() {
				store.media_url = Some(master_url);
				store.media = Some(MediaManifest::from_playlist(&media));
			}

			publish_total_duration(inner);
			Ok(())
		}
	}
}

/// Refetches the media playlist and merges new segments into the store.
#[tracing::instrument(skip(inner), fields(%epoch))]
pub async fn refresh(inner: &PlayerInnerHolder, epoch: Epoch) -> PlayerResult<()> {
	let media_url = inner
		.borrow()
		.manifest
		.as_ref()
		.and_then(|store| store.media_url.clone())
		.ok_or(PlayerError::NoSource)?;

	let playlist = fetch_playlist(inner, epoch, &media_url).await?;
	dispatch!(inner
		.borrow_mut()
		.events
		.emit(PlayerEvent::ManifestParsed(summary(&media_url, &playlist))));

	let media = match playlist {
		Playlist::Media(media) => media,
		// Still no segments behind a playlist without renditions.
		Playlist::Master(master) if master.streams.is_empty() => return Ok(()),
		Playlist::Master(_) => {
			let err = PlayerError::ManifestParse("expected a media playlist".into());
			if let Some(event) = err.event_error(false) {
				dispatch!(inner.borrow_mut().events.emit(event));
			}
			return Err(err);
		}
	};

	{
		let mut inner = inner.borrow_mut();
		let store = inner.manifest.as_mut().ok_or(PlayerError::NoSource)?;
		match store.media.as_mut() {
			Some(manifest) => {
				let appended = manifest.merge(&media);
				tracing::debug!(appended, total = manifest.len(), "merged media playlist");
			}
			None => store.media = Some(MediaManifest::from_playlist(&media)),
		}
	}

	publish_total_duration(inner);
	Ok(())
}

/// Mirrors the manifest's total duration into the state and the sink when it changed.
fn publish_total_duration(inner: &PlayerInnerHolder) {
	let total = {
		let mut inner_mut = inner.borrow_mut();
		let Some(total) = inner_mut.manifest.as_ref().and_then(|s| s.media()).map(MediaManifest::total_duration) else {
			return;
		};

		if inner_mut.state.total_duration == total {
			return;
		}

		inner_mut.state.total_duration = total;
		total
	};

	dispatch!(inner.borrow_mut().notify_state(&[StateField::TotalDuration]));

	let platform = inner.platform();
	let sink = platform.sink.sink();
	if sink.ready_state() != SinkState::Open {
		return;
	}

	if let Err(err) = sink.set_duration(total) {
		tracing::warn!(total, "failed to update sink duration: {err}");
		dispatch!(inner.borrow_mut().events.emit(EventError::from(err)));
	}
}
