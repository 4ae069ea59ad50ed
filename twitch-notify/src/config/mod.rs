//! Configuration.
//!
//! Two kinds of configuration live here:
//! - [`Settings`]: process settings read from the environment at startup.
//! - [`NotifyConfig`]: per-server notify channels, persisted through a
//!   [`ConfigStore`] and served from memory by [`ConfigService`].

mod service;
mod settings;
mod store;

pub use service::ConfigService;
pub use settings::Settings;
pub use store::{ConfigStore, JsonFileStore, MemoryStore, NotifyConfig, ServerConfig};
