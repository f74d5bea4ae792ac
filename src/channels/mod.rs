//! Chat platform implementations of [`SupportPlatform`](crate::pipeline::types::SupportPlatform).

pub mod discord;

pub use discord::{DiscordHandler, DiscordPlatform};
