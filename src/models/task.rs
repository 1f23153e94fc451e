//! Crawl tasks and the keyword sets they carry.

use std::sync::Arc;

use crate::models::Channel;

/// An immutable, cheaply clonable keyword set.
///
/// Entries are trimmed, blank entries dropped and duplicates removed
/// (case-insensitively, first spelling wins).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords(Arc<[String]>);

impl Keywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = Vec::<String>::new();
        let mut kept = Vec::new();
        for keyword in keywords {
            let trimmed = keyword.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            let folded = trimmed.to_lowercase();
            if seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            kept.push(trimmed.to_string());
        }
        Self(kept.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A unit of crawl work: one channel and the message keywords to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub channel: Channel,
    pub keywords: Keywords,
}

impl CrawlTask {
    pub fn new(channel: Channel, keywords: Keywords) -> Self {
        Self { channel, keywords }
    }
}
