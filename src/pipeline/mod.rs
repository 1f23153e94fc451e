//! Pipeline entry points for crawler operations.
//!
//! - `scheduler`: rate-limited worker pool draining the task queue
//! - `run_crawler`: wire storage, transport and services together and crawl
//!   until shutdown

pub mod crawl;
pub mod scheduler;

pub use crawl::{CrawlSummary, run_crawler};
pub use scheduler::{RateLimitedScheduler, TaskHandler, TaskQueue, TaskSender, task_queue};
