//! Browser bindings: the collaborators backed by web APIs and the exported player.

mod api;
mod fetch;
mod media_source;
mod transmuxer;
mod util;
mod video;
