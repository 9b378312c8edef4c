//! Reader configuration
//!
//! The reader is deliberately simple; the only knobs are a channel filter for
//! bus records and container-cache behavior on long linear reads.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::BlfReader`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Optional: only emit bus records from these channels. Metadata records
    /// (Upper PDU) are always emitted.
    #[serde(default)]
    pub channel_filter: Option<Vec<u16>>,

    /// Keep decompressed container buffers for the whole session. Disable to
    /// evict buffers behind the linear read cursor, bounding memory on large
    /// traces at the cost of re-inflating on random access.
    #[serde(default = "default_true")]
    pub cache_containers: bool,
}

fn default_true() -> bool {
    true
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict bus records to the given channels
    pub fn with_channel_filter(mut self, channels: Vec<u16>) -> Self {
        self.channel_filter = Some(channels);
        self
    }

    /// Control container-buffer retention (see [`ReaderConfig::cache_containers`])
    pub fn with_container_cache(mut self, cache: bool) -> Self {
        self.cache_containers = cache;
        self
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            channel_filter: None,
            cache_containers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReaderConfig::new();
        assert!(config.channel_filter.is_none());
        assert!(config.cache_containers);
    }

    #[test]
    fn test_builder() {
        let config = ReaderConfig::new()
            .with_channel_filter(vec![1, 2])
            .with_container_cache(false);
        assert_eq!(config.channel_filter, Some(vec![1, 2]));
        assert!(!config.cache_containers);
    }
}
