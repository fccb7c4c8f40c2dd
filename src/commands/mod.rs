pub mod clean;
pub mod convert;
pub mod playlists;
pub mod retag;
pub mod watch;
