/// Environment variable overriding [`SchedulerConfig::max_concurrent`]
pub const MAX_CONCURRENT_ENV: &str = "PAGEFLOW_MAX_CONCURRENT";
/// Environment variable overriding [`SchedulerConfig::event_buffer_size`]
pub const EVENT_BUFFER_ENV: &str = "PAGEFLOW_EVENT_BUFFER";

/// Configuration for the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on simultaneously running workflows
    pub max_concurrent: usize,
    pub event_buffer_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            event_buffer_size: 1000,
        }
    }
}

impl SchedulerConfig {
    /// Defaults overridden by `PAGEFLOW_MAX_CONCURRENT` / `PAGEFLOW_EVENT_BUFFER`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: env_usize(MAX_CONCURRENT_ENV).unwrap_or(defaults.max_concurrent),
            event_buffer_size: env_usize(EVENT_BUFFER_ENV).unwrap_or(defaults.event_buffer_size),
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// `max_concurrent` is at least 1
    pub(crate) fn normalized(mut self) -> Self {
        if self.max_concurrent == 0 {
            tracing::warn!("max_concurrent of 0 is not allowed, using 1");
            self.max_concurrent = 1;
        }
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a number", key, raw);
            None
        }
    }
}
