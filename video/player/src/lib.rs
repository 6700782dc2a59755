//! An epoch-versioned HLS playback controller.
//!
//! The [`Player`] loads a playlist, prefetches MPEG-TS segments, transmuxes them to
//! fragmented MP4 and appends them to a [`MediaSink`](player::sink::MediaSink). Seeks
//! and source changes bump an epoch counter; any work tagged with an older epoch
//! discards itself at its next suspension point.

pub mod hls;
pub mod logging;
pub mod player;

#[cfg(target_arch = "wasm32")]
mod web;

#[cfg(test)]
mod tests;

pub use hls_player_types::{ErrorKind, PlaybackState, StateField};

pub use self::player::{Player, PlayerSettings};
