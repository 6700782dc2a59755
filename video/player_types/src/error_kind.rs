/// The category attached to every error event the player emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
	/// A manifest or segment request failed (reported per attempt).
	Fetch,
	/// A playlist could not be parsed.
	ManifestParse,
	/// The buffer sink cannot accept the configured container type.
	UnsupportedFormat,
	/// The transmuxer rejected a segment.
	Transmux,
	/// The buffer sink failed an operation.
	Sink,
	/// The playback surface refused to play or pause.
	Playback,
}

impl ErrorKind {
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::Fetch => "fetch",
			Self::ManifestParse => "manifestParse",
			Self::UnsupportedFormat => "unsupportedFormat",
			Self::Transmux => "transmux",
			Self::Sink => "sink",
			Self::Playback => "playback",
		}
	}
}

impl std::fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
