pub mod client;
pub mod config;
pub mod jobs;
pub mod lifecycle;
pub mod scheduler;
pub mod terminal;
