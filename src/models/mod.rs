//! Data models for the Bot API, downloader output and keyboard payloads.

/// Bot API wire types
pub mod telegram;
/// Downloader metadata
pub mod media;
/// Inline keyboard callback payloads
pub mod choice;
