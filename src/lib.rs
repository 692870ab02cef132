pub mod cli;
pub mod core;
pub mod interfaces;
pub mod logging;
