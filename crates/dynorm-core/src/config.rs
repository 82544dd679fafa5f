//! Executor configuration.

use std::time::Duration;

/// Default deadline applied to a read when the caller supplies none.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default maximum number of pages fetched by a single read.
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Query executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Deadline for a whole read, checked between pages. `None` disables it.
    pub read_timeout: Option<Duration>,

    /// Maximum pages per read before the store is considered stuck.
    pub max_pages: usize,
}

impl ExecutorConfig {
    /// Create a configuration with default limits.
    pub fn new() -> Self {
        Self {
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Disable the read timeout.
    pub fn without_read_timeout(mut self) -> Self {
        self.read_timeout = None;
        self
    }

    /// Set the page limit. Values below one are raised to one.
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}
