//! twitch-notify library crate.
//!
//! Announces server members going live on Twitch to configured chat channels.

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod notifier;
pub mod presence;
pub mod utils;

pub use error::{Error, Result};
