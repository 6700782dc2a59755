use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use hls_player_types::{PlaybackState, StateField};

use super::epoch::{Epoch, EpochController};
use super::errors::{PlayerError, PlayerResult};
use super::events::{EventManager, StateChange};
use super::fetch::{HttpClient, InflightFetches};
use super::manifest::ManifestStore;
use super::settings::PlayerSettings;
use super::sink::{MediaSink, SinkCoordinator};
use super::surface::PlaybackSurface;
use super::transmux::{TransmuxPipeline, Transmuxer};

type BorrowLocation = Rc<Cell<Option<&'static std::panic::Location<'static>>>>;

/// Shared handle to the player state.
///
/// The state is only ever touched from a single thread; borrows must never be held
/// across an await point. The last borrow location is tracked to make double
/// borrows easy to find.
#[derive(Clone)]
pub struct PlayerInnerHolder(Rc<RefCell<PlayerInner>>, BorrowLocation, Rc<Platform>);

#[derive(Clone)]
pub struct PlayerInnerWeakHolder(
	Weak<RefCell<PlayerInner>>,
	Weak<Cell<Option<&'static std::panic::Location<'static>>>>,
	Weak<Platform>,
);

impl PlayerInnerHolder {
	pub fn new(inner: PlayerInner, platform: Platform) -> Self {
		Self(Rc::new(RefCell::new(inner)), Rc::new(Cell::new(None)), Rc::new(platform))
	}

	#[track_caller]
	pub fn borrow(&self) -> std::cell::Ref<PlayerInner> {
		let borrow = self
			.0
			.try_borrow()
			.map_err(|err| {
				tracing::error!(
					"Failed to borrow player inner\nPrevious borrow location: {:?}\nNew Location: {:?}",
					self.1.get(),
					std::panic::Location::caller()
				);
				err
			})
			.expect("failed to borrow player inner");

		self.1.set(Some(std::panic::Location::caller()));

		borrow
	}

	#[track_caller]
	pub fn borrow_mut(&self) -> std::cell::RefMut<PlayerInner> {
		let borrow = self
			.0
			.try_borrow_mut()
			.map_err(|err| {
				tracing::error!(
					"Failed to mutably borrow player inner\nPrevious borrow location: {:?}\nNew Location: {:?}",
					self.1.get(),
					std::panic::Location::caller()
				);
				err
			})
			.expect("failed to borrow player inner");

		self.1.set(Some(std::panic::Location::caller()));

		borrow
	}

	/// The external collaborators. These are not behind the state cell, so they can be
	/// awaited on without holding a borrow.
	pub fn platform(&self) -> Rc<Platform> {
		self.2.clone()
	}

	/// Fails with [`PlayerError::Cancelled`] once `epoch` is no longer current.
	#[track_caller]
	pub fn ensure_current(&self, epoch: Epoch) -> PlayerResult<()> {
		if self.borrow().epoch.is_current(epoch) {
			Ok(())
		} else {
			Err(PlayerError::Cancelled)
		}
	}

	pub fn downgrade(&self) -> PlayerInnerWeakHolder {
		PlayerInnerWeakHolder(Rc::downgrade(&self.0), Rc::downgrade(&self.1), Rc::downgrade(&self.2))
	}
}

impl PlayerInnerWeakHolder {
	pub fn upgrade(&self) -> Option<PlayerInnerHolder> {
		let inner = self.0.upgrade()?;
		let location = self.1.upgrade()?;
		let platform = self.2.upgrade()?;

		Some(PlayerInnerHolder(inner, location, platform))
	}
}

pub struct Platform {
	pub client: Rc<dyn HttpClient>,
	pub surface: Rc<dyn PlaybackSurface>,
	pub sink: SinkCoordinator,
	pub pipeline: TransmuxPipeline,
}

impl Platform {
	pub fn new(
		client: Rc<dyn HttpClient>,
		transmuxer: Rc<dyn Transmuxer>,
		sink: Rc<dyn MediaSink>,
		surface: Rc<dyn PlaybackSurface>,
	) -> Self {
		Self {
			client,
			surface,
			sink: SinkCoordinator::new(sink),
			pipeline: TransmuxPipeline::new(transmuxer),
		}
	}
}

pub struct PlayerInner {
	pub settings: PlayerSettings,
	pub state: PlaybackState,
	pub epoch: EpochController,
	pub manifest: Option<ManifestStore>,
	pub fetches: InflightFetches,
	pub events: EventManager,
	pub destroyed: bool,
}

impl PlayerInner {
	pub fn new(settings: PlayerSettings, volume: f64) -> Self {
		Self {
			state: PlaybackState::new(!settings.autoplay, settings.muted, volume),
			epoch: EpochController::new(),
			manifest: None,
			fetches: InflightFetches::default(),
			events: EventManager::new(settings.debug),
			destroyed: false,
			settings,
		}
	}

	#[must_use = "must be called to process events use dispatch! macro"]
	pub fn notify_state(&mut self, fields: &[StateField]) -> impl FnOnce() + 'static {
		let change = StateChange {
			state: self.state.clone(),
			fields: fields.to_vec(),
		};

		self.events.emit(change)
	}
}
