use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use bytes::Bytes;
use futures::future::LocalBoxFuture;
use hls_player_types::{PlaybackState, StateField};

use super::errors::EventError;
use super::manifest::Segment;

#[derive(Debug, Clone)]
pub enum PlayerEvent {
	/// The buffer handle was attached to the sink.
	Init,
	ManifestParsed(ManifestSummary),
	/// The first append of an epoch completed.
	FirstSegmentLoaded(SegmentEvent),
	SegmentLoaded(SegmentEvent),
	/// Data became playable; fires with every first append of an epoch.
	Ready,
	StateChanged(StateChange),
	Error(EventError),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSummary {
	pub url: String,
	pub master: bool,
	pub renditions: usize,
	pub segments: usize,
	pub end_list: bool,
	pub target_duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentEvent {
	pub segment: Segment,
	pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct StateChange {
	pub state: PlaybackState,
	pub fields: Vec<StateField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventType {
	Init,
	ManifestParsed,
	FirstSegmentLoaded,
	SegmentLoaded,
	Ready,
	StateChanged,
	Error,
}

impl std::str::FromStr for EventType {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"init" => Ok(Self::Init),
			"manifestparsed" => Ok(Self::ManifestParsed),
			"firstsegmentloaded" => Ok(Self::FirstSegmentLoaded),
			"segmentloaded" => Ok(Self::SegmentLoaded),
			"ready" => Ok(Self::Ready),
			"statechanged" => Ok(Self::StateChanged),
			"error" => Ok(Self::Error),
			_ => Err(()),
		}
	}
}

impl PlayerEvent {
	pub const fn ty(&self) -> EventType {
		match self {
			Self::Init => EventType::Init,
			Self::ManifestParsed(_) => EventType::ManifestParsed,
			Self::FirstSegmentLoaded(_) => EventType::FirstSegmentLoaded,
			Self::SegmentLoaded(_) => EventType::SegmentLoaded,
			Self::Ready => EventType::Ready,
			Self::StateChanged(_) => EventType::StateChanged,
			Self::Error(_) => EventType::Error,
		}
	}
}

impl From<EventError> for PlayerEvent {
	fn from(error: EventError) -> Self {
		Self::Error(error)
	}
}

impl From<StateChange> for PlayerEvent {
	fn from(change: StateChange) -> Self {
		Self::StateChanged(change)
	}
}

/// Handle returned when a listener is registered, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Async hook that may replace the raw bytes of a freshly fetched segment.
/// Returning `None` keeps the original bytes.
pub type SegmentBytesFilter = Rc<dyn Fn(Segment, Bytes) -> LocalBoxFuture<'static, Option<Bytes>>>;

#[derive(Clone)]
struct EventListener {
	id: ListenerId,
	f: Rc<dyn Fn(&PlayerEvent)>,
	used: Option<Rc<Cell<bool>>>,
}

pub struct EventManager {
	listeners: HashMap<EventType, Vec<EventListener>>,
	dirty: Rc<Cell<bool>>,
	next_id: u64,
	debug: bool,
	bytes_filter: Option<SegmentBytesFilter>,
}

impl EventManager {
	pub fn new(debug: bool) -> Self {
		Self {
			listeners: HashMap::new(),
			dirty: Rc::new(Cell::new(false)),
			next_id: 0,
			debug,
			bytes_filter: None,
		}
	}

	fn clean(&mut self) {
		if self.dirty.get() {
			for listeners in self.listeners.values_mut() {
				listeners.retain(|x| x.used.as_ref().map_or(true, |used| !used.get()));
			}

			self.dirty.set(false);
		}
	}

	pub fn add_event_listener(&mut self, event: EventType, f: Rc<dyn Fn(&PlayerEvent)>, once: bool) -> ListenerId {
		self.clean();

		self.next_id += 1;
		let id = ListenerId(self.next_id);

		self.listeners.entry(event).or_default().push(EventListener {
			id,
			f,
			used: once.then(|| Rc::new(Cell::new(false))),
		});

		id
	}

	pub fn remove_event_listener(&mut self, event: EventType, id: ListenerId) {
		self.clean();

		if let Some(listeners) = self.listeners.get_mut(&event) {
			listeners.retain(|x| x.id != id);
		}
	}

	pub fn set_bytes_filter(&mut self, filter: Option<SegmentBytesFilter>) {
		self.bytes_filter = filter;
	}

	pub fn bytes_filter(&self) -> Option<SegmentBytesFilter> {
		self.bytes_filter.clone()
	}

	#[must_use = "must be called to process events use dispatch! macro"]
	pub fn emit(&mut self, event: impl Into<PlayerEvent>) -> impl FnOnce() + 'static {
		self.clean();

		let event = event.into();
		let ty = event.ty();
		let dirty = self.dirty.clone();
		let listeners = self.listeners.get(&ty).cloned().unwrap_or_default();

		if self.debug {
			tracing::debug!(event = ?ty, listeners = listeners.len(), "emitting event");
		}

		move || {
			for listener in listeners {
				if let Some(used) = listener.used.as_ref() {
					if used.get() {
						continue;
					}

					used.set(true);
					dirty.set(true);
				}

				(listener.f)(&event);
			}
		}
	}
}

macro_rules! dispatch {
	($x:expr) => {{
		let f = { $x };
		f()
	}};
}

pub(crate) use dispatch;
