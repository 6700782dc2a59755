use std::time::Duration;

use super::errors::{PlayerError, PlayerResult};

/// Settings to configure the player.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSettings {
	/// Show the playback surface's native controls.
	/// Defaults to false.
	pub controls: bool,

	/// Start playing as soon as media is buffered.
	/// The initial `paused` state is the inverse of this flag.
	/// Defaults to false.
	pub autoplay: bool,

	/// Start muted.
	/// Defaults to false.
	pub muted: bool,

	/// Echo every emitted event through the debug log.
	/// Defaults to false.
	pub debug: bool,

	/// The mime type the buffer sink is asked to accept.
	/// Defaults to `video/mp4; codecs="avc1.42E01E, mp4a.40.2"`
	pub codecs: String,

	/// How far past the current position the scheduler prefetches.
	/// Defaults to 60s
	pub lookahead_secs: f64,

	/// Once the buffered span exceeds this, only segments inside the look-ahead window are fetched.
	/// Defaults to 150s
	pub max_buffer_secs: f64,

	/// Delay between two scheduler passes (also the manifest refresh cadence).
	/// Defaults to 3000ms
	pub scheduler_interval_ms: u64,

	/// Fixed delay before a failed request is retried.
	/// Defaults to 3000ms
	pub retry_backoff_ms: u64,

	/// Number of retries before a failed request is surfaced.
	/// Defaults to u32::MAX (retry until cancelled).
	pub max_retries: u32,

	/// Seek targets are clamped to `total_duration - seek_end_margin_secs`.
	/// Defaults to 1s
	pub seek_end_margin_secs: f64,

	/// When the buffer drains past a segment the scheduler stopped at, the player
	/// force-reloads this far ahead of the current position.
	/// Defaults to 0.5s
	pub force_reload_lead_secs: f64,
}

impl Default for PlayerSettings {
	fn default() -> Self {
		Self {
			controls: false,
			autoplay: false,
			muted: false,
			debug: false,
			codecs: r#"video/mp4; codecs="avc1.42E01E, mp4a.40.2""#.to_string(),
			lookahead_secs: 60.0,
			max_buffer_secs: 150.0,
			scheduler_interval_ms: 3000,
			retry_backoff_ms: 3000,
			max_retries: u32::MAX,
			seek_end_margin_secs: 1.0,
			force_reload_lead_secs: 0.5,
		}
	}
}

impl PlayerSettings {
	pub fn from_json(json: &str) -> PlayerResult<Self> {
		let mut deserializer = serde_json::Deserializer::from_str(json);

		let settings: Self = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|err| PlayerError::Settings(format!("failed to deserialize ({}): {}", err.path(), err.inner())))?;

		settings.validate()?;
		Ok(settings)
	}

	pub fn validate(&self) -> PlayerResult<()> {
		if !(self.lookahead_secs.is_finite() && self.lookahead_secs > 0.0) {
			return Err(PlayerError::Settings("lookaheadSecs must be a positive number".into()));
		}

		if !(self.max_buffer_secs.is_finite() && self.max_buffer_secs > 0.0) {
			return Err(PlayerError::Settings("maxBufferSecs must be a positive number".into()));
		}

		if self.scheduler_interval_ms == 0 {
			return Err(PlayerError::Settings("schedulerIntervalMs must be greater than 0".into()));
		}

		if !(self.seek_end_margin_secs.is_finite() && self.seek_end_margin_secs >= 0.0) {
			return Err(PlayerError::Settings("seekEndMarginSecs must not be negative".into()));
		}

		if !self.force_reload_lead_secs.is_finite() {
			return Err(PlayerError::Settings("forceReloadLeadSecs must be a number".into()));
		}

		if self.codecs.trim().is_empty() {
			return Err(PlayerError::Settings("codecs must not be empty".into()));
		}

		Ok(())
	}

	pub fn scheduler_interval(&self) -> Duration {
		Duration::from_millis(self.scheduler_interval_ms)
	}

	pub fn retry_backoff(&self) -> Duration {
		Duration::from_millis(self.retry_backoff_ms)
	}
}
