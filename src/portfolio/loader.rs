//! JSON persistence for portfolio configurations

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use super::PortfolioConfig;
use crate::errors::Result;

/// Load a config from any JSON reader
pub fn load_config_from_reader<R: Read>(reader: R) -> Result<PortfolioConfig> {
    let config: PortfolioConfig = serde_json::from_reader(reader)?;
    Ok(config)
}

/// Load a config from a JSON file
pub fn load_config(path: &Path) -> Result<PortfolioConfig> {
    let file = File::open(path)?;
    let config = load_config_from_reader(BufReader::new(file))?;
    log::info!(
        "loaded portfolio config from {} ({} ETH / {} stablecoin entries)",
        path.display(),
        config.eth_allocations.len(),
        config.stablecoin_allocations.len()
    );
    Ok(config)
}

pub fn save_config_to_writer<W: Write>(config: &PortfolioConfig, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, config)?;
    Ok(())
}

pub fn save_config(config: &PortfolioConfig, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    save_config_to_writer(config, file)
}
