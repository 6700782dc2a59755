/// The element that actually plays the buffered media.
#[async_trait::async_trait(?Send)]
pub trait PlaybackSurface {
	fn current_time(&self) -> f64;

	fn set_current_time(&self, seconds: f64);

	fn volume(&self) -> f64;

	fn muted(&self) -> bool;

	fn set_muted(&self, muted: bool);

	fn set_autoplay(&self, autoplay: bool);

	fn set_controls(&self, controls: bool);

	async fn play(&self) -> Result<(), String>;

	async fn pause(&self) -> Result<(), String>;
}

/// Notifications the surface forwards to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
	TimeUpdate,
	VolumeChange,
}
