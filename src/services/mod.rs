//! Services behind the chat handlers.
//!
//! They wrap the external systems (Bot API, downloader executable) behind
//! traits, and hold the polling loop and the in-memory link cache.

pub mod downloader;
pub mod link_cache;
pub mod poller;
pub mod telegram_client;
