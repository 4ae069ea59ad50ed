//! Minimal Twitch Helix client.
//!
//! Covers what a go-live notifier needs: resolving a channel login (or a
//! `twitch.tv` URL) to a user id and fetching that user's current stream.

mod client;
mod error;
mod models;

pub use client::{Credentials, TwitchClient, URL_REGEX, login_from_url};
pub use error::{Result, TwitchError};
pub use models::{Stream, User};
