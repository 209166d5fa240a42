pub mod agent;
pub mod api;
pub mod config;
pub mod errors;
pub mod preview;
pub mod server;
pub mod sessions;
pub mod tasks;
pub mod telemetry;
pub mod testing;
pub mod theme;
pub mod util;
pub mod webhook;
pub mod workflow;
