mod error_kind;
mod playback_state;

pub use error_kind::ErrorKind;
pub use playback_state::{PlaybackState, StateField};
