use std::fs;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::observer::register_all_observers;
use crate::services::{NetworkState, VendorNetwork};

/// On-disk encoding of the state file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFormat {
    Yaml,
    Json,
}

impl StateFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => StateFormat::Json,
            _ => StateFormat::Yaml,
        }
    }
}

pub fn default_state_path() -> PathBuf {
    std::env::var("VENDORNET_STATE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("vendornet.yaml"))
}

pub fn load_state(path: &Path) -> anyhow::Result<NetworkState> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "State file {} not found; run `vendornet init` first",
            path.display()
        ));
    }

    let content = fs::read_to_string(path)?;
    let state = match StateFormat::for_path(path) {
        StateFormat::Json => serde_json::from_str(&content)?,
        StateFormat::Yaml => serde_yaml::from_str(&content)?,
    };
    Ok(state)
}

pub fn save_state(path: &Path, state: &NetworkState) -> anyhow::Result<()> {
    let content = match StateFormat::for_path(path) {
        StateFormat::Json => serde_json::to_string_pretty(state)?,
        StateFormat::Yaml => serde_yaml::to_string(state)?,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, content)?;
    Ok(())
}

/// Load the state file into a live network using the process configuration
pub fn open_network(path: &Path, config: &AppConfig) -> anyhow::Result<VendorNetwork> {
    let state = load_state(path)?;
    let mut pipeline = VendorNetwork::pipeline_for(config);
    register_all_observers(&mut pipeline, &config.observer);
    let network = VendorNetwork::from_state(state, config.clone(), pipeline)
        .map_err(|e| anyhow::anyhow!("State file {} is invalid: {}", path.display(), e))?;
    Ok(network)
}

pub async fn save_network(path: &Path, network: &VendorNetwork) -> anyhow::Result<()> {
    let state = network.export_state().await;
    save_state(path, &state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(StateFormat::for_path(Path::new("net.json")), StateFormat::Json);
        assert_eq!(StateFormat::for_path(Path::new("net.yaml")), StateFormat::Yaml);
        assert_eq!(StateFormat::for_path(Path::new("net")), StateFormat::Yaml);
    }
}
