/// The externally observable playback snapshot.
///
/// Every mutation the player makes to this struct is paired with a
/// notification that names exactly the [`StateField`]s that changed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
	pub paused: bool,
	pub seeking: bool,
	pub muted: bool,
	/// 0.0 - 1.0
	pub volume: f64,
	/// Start of the span buffered in the current epoch, in seconds.
	pub begin_load_time: f64,
	/// End of the span buffered in the current epoch, in seconds.
	pub end_load_time: f64,
	pub current_time: f64,
	pub total_duration: f64,
}

impl PlaybackState {
	pub fn new(paused: bool, muted: bool, volume: f64) -> Self {
		Self {
			paused,
			seeking: true,
			muted,
			volume,
			begin_load_time: 0.0,
			end_load_time: 0.0,
			current_time: 0.0,
			total_duration: 0.0,
		}
	}

	/// Seconds of media appended since the last hard seek.
	pub fn buffered_span(&self) -> f64 {
		self.end_load_time - self.begin_load_time
	}

	/// Whether `time` falls inside `[begin_load_time, end_load_time)`.
	pub fn is_buffered(&self, time: f64) -> bool {
		self.begin_load_time <= time && self.end_load_time > time
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateField {
	Paused,
	Seeking,
	Muted,
	Volume,
	BeginLoadTime,
	EndLoadTime,
	CurrentTime,
	TotalDuration,
}

impl StateField {
	pub const ALL: [StateField; 8] = [
		Self::Paused,
		Self::Muted,
		Self::Volume,
		Self::Seeking,
		Self::BeginLoadTime,
		Self::EndLoadTime,
		Self::CurrentTime,
		Self::TotalDuration,
	];
}
