//! Service layer for the crawler.
//!
//! This module contains the crawl logic:
//! - Channel crawling (`ChannelCrawler`)
//! - Discovery searches (`SeedLoop`)
//! - Message classification (`ContentClassifier`)
//! - Frontier extraction, fuzzy matching and entity recognition helpers

mod channel_crawler;
pub mod classifier;
mod context;
pub mod entities;
pub mod frontier;
pub mod fuzzy;
mod seeder;

pub use channel_crawler::ChannelCrawler;
pub use classifier::{ContentClassifier, Signal};
pub use context::CrawlContext;
pub use entities::{EntityRecognizer, RuleRecognizer};
pub use seeder::SeedLoop;
