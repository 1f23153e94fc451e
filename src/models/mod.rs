// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod channel;
mod config;
mod crawler;
mod message;
mod task;

// Re-export all public types
pub use channel::{Channel, ChannelId, ChannelStatus, Peer, PeerRef, User};
pub use config::{ClassifierConfig, Config, CrawlerConfig, StorageConfig, TransportConfig};
pub use crawler::{CrawlOutcome, CrawlStage, CrawlStats};
pub use message::{Message, StoredMessage};
pub use task::{CrawlTask, Keywords};
