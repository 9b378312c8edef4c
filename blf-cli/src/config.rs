//! Reader configuration file loading
//!
//! The CLI accepts the library's `ReaderConfig` as a TOML file:
//!
//! ```toml
//! channel_filter = [1, 2]
//! cache_containers = false
//! ```

use anyhow::{Context, Result};
use blf_codec::ReaderConfig;
use std::path::Path;

pub fn load_config(path: &Path) -> Result<ReaderConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let config: ReaderConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse config file {:?}", path))?;
    log::debug!("loaded reader config from {:?}: {:?}", path, config);
    Ok(config)
}
