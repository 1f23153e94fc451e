// src/models/crawler.rs

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::ChannelStatus;

/// Step of the per-channel crawl at which a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStage {
    Joining,
    Scanning,
    Extracting,
    Classifying,
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlStage::Joining => "joining",
            CrawlStage::Scanning => "scanning",
            CrawlStage::Extracting => "extracting",
            CrawlStage::Classifying => "classifying",
        };
        f.write_str(name)
    }
}

/// Terminal state of one crawl task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Scan finished and the status was recorded
    Classified(ChannelStatus),
    /// Channel is private or we are banned from it
    SkippedPrivate,
    /// Platform rejected the channel identity
    SkippedInvalid,
    /// Unexpected failure; nothing recorded
    SkippedError { stage: CrawlStage, message: String },
    /// Channel already in progress or finalized
    Duplicate,
    /// Shutdown observed before the task could finish
    Cancelled,
}

/// Outcome counters shared by every worker.
#[derive(Debug, Default)]
pub struct CrawlStats {
    clean: AtomicUsize,
    involved: AtomicUsize,
    skipped_private: AtomicUsize,
    skipped_invalid: AtomicUsize,
    failed: AtomicUsize,
    duplicate: AtomicUsize,
    cancelled: AtomicUsize,
    discovered: AtomicUsize,
}

impl CrawlStats {
    pub fn record(&self, outcome: &CrawlOutcome) {
        let counter = match outcome {
            CrawlOutcome::Classified(ChannelStatus::Involved) => &self.involved,
            CrawlOutcome::Classified(_) => &self.clean,
            CrawlOutcome::SkippedPrivate => &self.skipped_private,
            CrawlOutcome::SkippedInvalid => &self.skipped_invalid,
            CrawlOutcome::SkippedError { .. } => &self.failed,
            CrawlOutcome::Duplicate => &self.duplicate,
            CrawlOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a channel submitted from a mention or link.
    pub fn record_discovery(&self) {
        self.discovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discovered(&self) -> usize {
        self.discovered.load(Ordering::Relaxed)
    }

    /// Snapshot as label/value pairs for the shutdown summary.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        vec![
            ("clean", load(&self.clean)),
            ("involved", load(&self.involved)),
            ("skipped_private", load(&self.skipped_private)),
            ("skipped_invalid", load(&self.skipped_invalid)),
            ("failed", load(&self.failed)),
            ("duplicate", load(&self.duplicate)),
            ("cancelled", load(&self.cancelled)),
            ("discovered", load(&self.discovered)),
        ]
    }
}
