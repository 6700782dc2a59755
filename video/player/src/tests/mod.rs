use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use bytes::Bytes;
use hls_player_types::StateField;
use tokio::sync::Notify;
use url::Url;

use crate::player::errors::{EventError, FetchError, SinkError, TransmuxError};
use crate::player::events::{EventType, PlayerEvent, StateChange};
use crate::player::fetch::{AbortHandle, HttpClient, HttpResponse};
use crate::player::inner::Platform;
use crate::player::sink::{MediaSink, SinkState};
use crate::player::surface::PlaybackSurface;
use crate::player::transmux::{TransmuxedFragment, Transmuxer};
use crate::player::{Player, PlayerSettings};

mod source;

pub const SOURCE: &str = "https://cdn.test/live/index.m3u8";

pub fn segment_url(index: usize) -> String {
	format!("https://cdn.test/live/seg{index}.ts")
}

pub fn media_playlist(durations: &[f64], end_list: bool) -> String {
	let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:0\n");
	for (idx, duration) in durations.iter().enumerate() {
		playlist.push_str(&format!("#EXTINF:{duration:.3},\nseg{idx}.ts\n"));
	}

	if end_list {
		playlist.push_str("#EXT-X-ENDLIST\n");
	}

	playlist
}

pub async fn run_local<F: Future>(f: F) -> F::Output {
	tokio::task::LocalSet::new().run_until(f).await
}

/// Lets spawned work run for `ms` of (paused) virtual time.
pub async fn settle(ms: u64) {
	tokio::time::sleep(Duration::from_millis(ms)).await;
}

pub enum Route {
	Body(Bytes),
	Status(u16),
	/// Fails with a 500 the given number of times, then serves the body.
	Flaky(u32, Bytes),
	/// Serves each body once, repeating the last one.
	Sequence(VecDeque<Bytes>),
	/// Never completes until aborted.
	Hang,
}

#[derive(Default)]
pub struct MockHttp {
	routes: RefCell<HashMap<String, Route>>,
	requests: RefCell<Vec<String>>,
}

impl MockHttp {
	pub fn route(&self, url: impl Into<String>, route: Route) {
		self.routes.borrow_mut().insert(url.into(), route);
	}

	pub fn body(&self, url: impl Into<String>, body: impl Into<Bytes>) {
		self.route(url, Route::Body(body.into()));
	}

	pub fn requests(&self) -> Vec<String> {
		self.requests.borrow().clone()
	}

	pub fn count(&self, url: &str) -> usize {
		self.requests.borrow().iter().filter(|r| r.as_str() == url).count()
	}

	/// Serves `seg{i}.ts` for every index in `0..count`.
	pub fn segments(&self, count: usize) {
		for idx in 0..count {
			self.body(segment_url(idx), format!("seg{idx}"));
		}
	}
}

#[async_trait::async_trait(?Send)]
impl HttpClient for MockHttp {
	async fn get(&self, url: &Url, abort: &AbortHandle) -> Result<HttpResponse, FetchError> {
		self.requests.borrow_mut().push(url.to_string());
		tokio::time::sleep(Duration::from_millis(10)).await;

		let response = {
			let mut routes = self.routes.borrow_mut();
			match routes.get_mut(url.as_str()) {
				None => Some(HttpResponse {
					status: 404,
					body: Bytes::new(),
				}),
				Some(Route::Body(body)) => Some(HttpResponse {
					status: 200,
					body: body.clone(),
				}),
				Some(Route::Status(status)) => Some(HttpResponse {
					status: *status,
					body: Bytes::new(),
				}),
				Some(Route::Flaky(failures, body)) => {
					if *failures > 0 {
						*failures -= 1;
						Some(HttpResponse {
							status: 500,
							body: Bytes::new(),
						})
					} else {
						Some(HttpResponse {
							status: 200,
							body: body.clone(),
						})
					}
				}
				Some(Route::Sequence(bodies)) => {
					let body = if bodies.len() > 1 { bodies.pop_front() } else { bodies.front().cloned() };
					Some(HttpResponse {
						status: 200,
						body: body.unwrap_or_default(),
					})
				}
				Some(Route::Hang) => None,
			}
		};

		match response {
			Some(response) => Ok(response),
			None => {
				abort.cancelled().await;
				Err(FetchError::Aborted)
			}
		}
	}
}

pub struct MockTransmuxer {
	pub inputs: RefCell<Vec<Bytes>>,
	pub bases: RefCell<Vec<f64>>,
	/// Fragments produced per pushed segment.
	pub fragments: Cell<usize>,
}

impl Default for MockTransmuxer {
	fn default() -> Self {
		Self {
			inputs: RefCell::new(Vec::new()),
			bases: RefCell::new(Vec::new()),
			fragments: Cell::new(1),
		}
	}
}

#[async_trait::async_trait(?Send)]
impl Transmuxer for MockTransmuxer {
	fn set_base_media_decode_time(&self, seconds: f64) {
		self.bases.borrow_mut().push(seconds);
	}

	async fn transmux(&self, data: Bytes) -> Result<Vec<TransmuxedFragment>, TransmuxError> {
		self.inputs.borrow_mut().push(data.clone());

		if data.as_ref() == b"corrupt" {
			return Err(TransmuxError::Rejected("no sync byte".into()));
		}

		Ok((0..self.fragments.get())
			.map(|idx| TransmuxedFragment {
				init_segment: Some(Bytes::from_static(b"init|")),
				data: Bytes::from(format!("{}.{idx}", String::from_utf8_lossy(&data))),
			})
			.collect())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
	Open,
	AddBufferHandle(String),
	AppendStart(Bytes),
	AppendEnd,
	Abort,
	TimestampOffset(f64),
	Duration(f64),
	EndOfStream,
	Reopen,
}

pub struct MockSink {
	pub state: Cell<SinkState>,
	pub supported: Cell<bool>,
	pub calls: RefCell<Vec<SinkCall>>,
	in_flight: Cell<usize>,
	pub max_in_flight: Cell<usize>,
	aborted: Notify,
}

impl Default for MockSink {
	fn default() -> Self {
		Self {
			state: Cell::new(SinkState::Closed),
			supported: Cell::new(true),
			calls: RefCell::new(Vec::new()),
			in_flight: Cell::new(0),
			max_in_flight: Cell::new(0),
			aborted: Notify::new(),
		}
	}
}

impl MockSink {
	fn record(&self, call: SinkCall) {
		self.calls.borrow_mut().push(call);
	}

	pub fn appends(&self) -> Vec<Bytes> {
		self.calls
			.borrow()
			.iter()
			.filter_map(|c| match c {
				SinkCall::AppendStart(data) => Some(data.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn count(&self, call: &SinkCall) -> usize {
		self.calls.borrow().iter().filter(|c| *c == call).count()
	}

	pub fn clear(&self) {
		self.calls.borrow_mut().clear();
	}
}

#[async_trait::async_trait(?Send)]
impl MediaSink for MockSink {
	async fn open(&self) -> Result<(), SinkError> {
		self.record(SinkCall::Open);
		self.state.set(SinkState::Open);
		Ok(())
	}

	fn is_type_supported(&self, _: &str) -> bool {
		self.supported.get()
	}

	fn add_buffer_handle(&self, mime: &str) -> Result<(), SinkError> {
		self.record(SinkCall::AddBufferHandle(mime.to_string()));
		Ok(())
	}

	async fn append_buffer(&self, data: Bytes) -> Result<(), SinkError> {
		if self.state.get() != SinkState::Open {
			return Err(SinkError::NotOpen);
		}

		self.in_flight.set(self.in_flight.get() + 1);
		self.max_in_flight.set(self.max_in_flight.get().max(self.in_flight.get()));
		self.record(SinkCall::AppendStart(data));

		let aborted = tokio::select! {
			_ = tokio::time::sleep(Duration::from_millis(5)) => false,
			_ = self.aborted.notified() => true,
		};

		self.in_flight.set(self.in_flight.get() - 1);
		self.record(SinkCall::AppendEnd);

		if aborted {
			Err(SinkError::Aborted)
		} else {
			Ok(())
		}
	}

	fn abort(&self) -> Result<(), SinkError> {
		self.record(SinkCall::Abort);
		self.aborted.notify_waiters();
		Ok(())
	}

	fn set_timestamp_offset(&self, seconds: f64) -> Result<(), SinkError> {
		self.record(SinkCall::TimestampOffset(seconds));
		Ok(())
	}

	fn set_duration(&self, seconds: f64) -> Result<(), SinkError> {
		self.record(SinkCall::Duration(seconds));
		Ok(())
	}

	fn end_of_stream(&self) -> Result<(), SinkError> {
		self.record(SinkCall::EndOfStream);
		self.state.set(SinkState::Ended);
		Ok(())
	}

	async fn reopen(&self, _: &str) -> Result<(), SinkError> {
		self.record(SinkCall::Reopen);
		self.state.set(SinkState::Open);
		Ok(())
	}

	fn ready_state(&self) -> SinkState {
		self.state.get()
	}
}

pub struct MockSurface {
	pub current_time: Cell<f64>,
	pub volume: Cell<f64>,
	pub muted: Cell<bool>,
	pub autoplay: Cell<bool>,
	pub controls: Cell<bool>,
	pub reject_play: Cell<bool>,
}

impl Default for MockSurface {
	fn default() -> Self {
		Self {
			current_time: Cell::new(0.0),
			volume: Cell::new(1.0),
			muted: Cell::new(false),
			autoplay: Cell::new(false),
			controls: Cell::new(false),
			reject_play: Cell::new(false),
		}
	}
}

#[async_trait::async_trait(?Send)]
impl PlaybackSurface for MockSurface {
	fn current_time(&self) -> f64 {
		self.current_time.get()
	}

	fn set_current_time(&self, seconds: f64) {
		self.current_time.set(seconds);
	}

	fn volume(&self) -> f64 {
		self.volume.get()
	}

	fn muted(&self) -> bool {
		self.muted.get()
	}

	fn set_muted(&self, muted: bool) {
		self.muted.set(muted);
	}

	fn set_autoplay(&self, autoplay: bool) {
		self.autoplay.set(autoplay);
	}

	fn set_controls(&self, controls: bool) {
		self.controls.set(controls);
	}

	async fn play(&self) -> Result<(), String> {
		if self.reject_play.get() {
			Err("NotAllowedError: play() failed because the user didn't interact with the document first".into())
		} else {
			Ok(())
		}
	}

	async fn pause(&self) -> Result<(), String> {
		Ok(())
	}
}

pub struct Harness {
	pub player: Player,
	pub http: Rc<MockHttp>,
	pub transmuxer: Rc<MockTransmuxer>,
	pub sink: Rc<MockSink>,
	pub surface: Rc<MockSurface>,
	pub events: Rc<RefCell<Vec<PlayerEvent>>>,
}

impl Harness {
	pub fn new(settings: PlayerSettings) -> Self {
		let http = Rc::new(MockHttp::default());
		let transmuxer = Rc::new(MockTransmuxer::default());
		let sink = Rc::new(MockSink::default());
		let surface = Rc::new(MockSurface::default());

		let platform = Platform::new(http.clone(), transmuxer.clone(), sink.clone(), surface.clone());
		let player = Player::new(settings, platform).expect("valid settings");

		let events = Rc::new(RefCell::new(Vec::new()));
		for ty in [
			EventType::Init,
			EventType::ManifestParsed,
			EventType::FirstSegmentLoaded,
			EventType::SegmentLoaded,
			EventType::Ready,
			EventType::StateChanged,
			EventType::Error,
		] {
			let events = events.clone();
			player.on(ty, move |evt| events.borrow_mut().push(evt.clone()));
		}

		Self {
			player,
			http,
			transmuxer,
			sink,
			surface,
			events,
		}
	}

	/// A player serving `durations` as a single media playlist at [`SOURCE`].
	pub fn with_media(durations: &[f64], end_list: bool) -> Self {
		let harness = Self::new(PlayerSettings::default());
		harness.http.body(SOURCE, media_playlist(durations, end_list));
		harness.http.segments(durations.len());
		harness
	}

	pub fn count(&self, ty: EventType) -> usize {
		self.events.borrow().iter().filter(|e| e.ty() == ty).count()
	}

	pub fn state_changes(&self) -> Vec<StateChange> {
		self.events
			.borrow()
			.iter()
			.filter_map(|e| match e {
				PlayerEvent::StateChanged(change) => Some(change.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn errors(&self) -> Vec<EventError> {
		self.events
			.borrow()
			.iter()
			.filter_map(|e| match e {
				PlayerEvent::Error(err) => Some(err.clone()),
				_ => None,
			})
			.collect()
	}

	pub fn clear_events(&self) {
		self.events.borrow_mut().clear();
	}

	/// Indices of segments appended in the current epoch.
	pub fn loaded(&self) -> Vec<usize> {
		self.player.inner().borrow().epoch.loaded().iter().collect()
	}

	pub fn notified(&self, field: StateField) -> usize {
		self.state_changes().iter().filter(|c| c.fields.contains(&field)).count()
	}
}
