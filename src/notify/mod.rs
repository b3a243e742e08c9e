//! Fire-and-forget event broadcast to connected observers

pub mod broadcast;

pub use broadcast::{ChannelNotifier, MockNotifier, Notifier};
