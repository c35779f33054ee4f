// Library target: the binary in main.rs and the integration tests under
// tests/ both build on these modules.

pub mod app;
pub mod config;
pub mod content;
pub mod error;
pub mod event;
pub mod quiz;
pub mod session;
pub mod store;
pub mod tabs;
pub mod ui;
