//! Go-live notifications.
//!
//! The notifier watches presence updates and announces a member once per
//! cooldown window when they start streaming:
//! - Edge detection (not streaming -> streaming) with a per-member cooldown
//! - Streamer id resolution and live metadata lookup
//! - Announcement rendering and delivery to every configured channel
//!
//! # Example
//!
//! ```ignore
//! let notifier = Arc::new(StreamNotifier::new(
//!     NotifierConfig::default(),
//!     NotifierContext::new(),
//!     Collaborators { configs, resolver, source, sink },
//! ));
//! notifier.spawn_listener(presence_rx);
//! notifier.start_history_sweeper();
//! ```

mod announcement;
mod history;
mod service;
mod source;

pub use announcement::{Announcement, AnnouncementAuthor};
pub use history::{NotifierContext, StreamHistory};
pub use service::{
    ChannelsConfigured, Collaborators, NotifierConfig, PresenceOutcome, StreamNotifier,
};
pub use source::{LookupError, StreamMetadata, StreamSource, StreamerResolver, TwitchLookup};
