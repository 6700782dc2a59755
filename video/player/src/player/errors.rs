use hls_player_types::ErrorKind;

pub type PlayerResult<T> = Result<T, PlayerError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
	#[error("request was aborted")]
	Aborted,
	#[error("server returned status code {0}")]
	StatusCode(u16),
	#[error("network error: {0}")]
	Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmuxError {
	#[error("transmuxer rejected segment: {0}")]
	Rejected(String),
	#[error("no initialization segment has been produced")]
	MissingInit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
	#[error("sink is not open")]
	NotOpen,
	#[error("append was aborted")]
	Aborted,
	#[error("{0}")]
	Platform(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
	#[error("network: {0}")]
	Network(FetchError),
	/// The operation was aborted or its epoch went stale. Never surfaced to the user.
	#[error("operation cancelled")]
	Cancelled,
	#[error("unsupported format: {0}")]
	UnsupportedFormat(String),
	#[error("failed to parse manifest: {0}")]
	ManifestParse(String),
	#[error("invalid url: {0}")]
	Url(#[from] url::ParseError),
	#[error("transmux: {0}")]
	Transmux(#[from] TransmuxError),
	#[error("sink: {0}")]
	Sink(#[from] SinkError),
	#[error("playback: {0}")]
	Playback(String),
	#[error("no source has been set")]
	NoSource,
	#[error("invalid settings: {0}")]
	Settings(String),
}

impl From<FetchError> for PlayerError {
	fn from(err: FetchError) -> Self {
		match err {
			FetchError::Aborted => Self::Cancelled,
			err => Self::Network(err),
		}
	}
}

impl PlayerError {
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	/// Network and parse failures are reported where they happen, so callers
	/// further up the chain must not report them a second time.
	pub fn is_surfaced(&self) -> bool {
		matches!(self, Self::Network(_) | Self::ManifestParse(_) | Self::UnsupportedFormat(_))
	}

	pub fn kind(&self) -> Option<ErrorKind> {
		match self {
			Self::Cancelled | Self::NoSource | Self::Settings(_) => None,
			Self::Network(_) => Some(ErrorKind::Fetch),
			Self::ManifestParse(_) | Self::Url(_) => Some(ErrorKind::ManifestParse),
			Self::UnsupportedFormat(_) => Some(ErrorKind::UnsupportedFormat),
			Self::Transmux(_) => Some(ErrorKind::Transmux),
			Self::Sink(_) => Some(ErrorKind::Sink),
			Self::Playback(_) => Some(ErrorKind::Playback),
		}
	}

	/// The event to emit for this error, `None` for errors that stay silent.
	pub fn event_error(&self, fatal: bool) -> Option<EventError> {
		self.kind().map(|kind| EventError::new(kind, self.to_string(), fatal))
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EventError {
	pub kind: ErrorKind,
	pub message: String,
	pub fatal: bool,
}

impl EventError {
	pub fn new(kind: ErrorKind, message: String, fatal: bool) -> Self {
		Self { kind, message, fatal }
	}

	pub fn set_fatal(&mut self, fatal: bool) {
		self.fatal = fatal;
	}
}

impl From<FetchError> for EventError {
	fn from(err: FetchError) -> Self {
		Self::new(ErrorKind::Fetch, err.to_string(), false)
	}
}

impl From<SinkError> for EventError {
	fn from(err: SinkError) -> Self {
		Self::new(ErrorKind::Sink, err.to_string(), false)
	}
}
