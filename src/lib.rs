pub mod commands;
pub mod config;
pub mod discover;
pub mod encode;
pub mod job;
pub mod playlist;
pub mod queue;
pub mod sync;
pub mod tags;
pub mod watch;
pub mod worker;
