use anyhow::{Context, Result};
use parley_core::config::RouterConfig;
use std::path::{Path, PathBuf};

/// Resolves the config to use: an explicit path must exist, the default
/// location may be absent.
pub fn load(path: Option<&Path>) -> Result<(RouterConfig, Option<PathBuf>)> {
    match path {
        Some(path) => {
            let config = RouterConfig::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            Ok((config, Some(path.to_path_buf())))
        }
        None => {
            let default_path = RouterConfig::default_path()?;
            let config = RouterConfig::load_or_default(&default_path).with_context(|| {
                format!("Failed to load config from {}", default_path.display())
            })?;
            let source = default_path.exists().then_some(default_path);
            Ok((config, source))
        }
    }
}

pub fn run(path: Option<&Path>) -> Result<()> {
    let (config, source) = load(path)?;
    match source {
        Some(source) => println!("# Loaded from {}", source.display()),
        None => println!("# Built-in defaults"),
    }
    print!("{}", config.to_toml_string()?);
    Ok(())
}
