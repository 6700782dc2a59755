mod playlist;

pub use self::playlist::{master, media, Playlist, PlaylistType};
