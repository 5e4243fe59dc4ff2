use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use flood_vision::core_modules::raster_loader::ImagerySourceConfig;
use flood_vision::pipeline::{AnalysisConfig, ExecutionMode};

pub const DEFAULT_BIND: &str = "127.0.0.1:3001";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub analysis: AnalysisConfig,
    pub imagery: ImagerySourceConfig,
    /// Overlays are kept in memory when unset.
    pub overlay_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            analysis: AnalysisConfig::default(),
            imagery: ImagerySourceConfig::default(),
            overlay_dir: None,
        }
    }
}

impl ServerConfig {
    /// Reads `FV_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(bind) = var("FV_BIND") {
            cfg.bind_addr = bind;
        }
        if let Some(mode) = var("FV_MODE") {
            cfg.analysis.mode = mode.parse::<ExecutionMode>().map_err(|e| anyhow!(e))?;
        }
        if let Some(url) = var("FV_IMAGERY_URL") {
            cfg.imagery.base_url = url;
        }
        if let Some(secs) = var("FV_FETCH_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().with_context(|| format!("FV_FETCH_TIMEOUT_SECS={secs}"))?;
            cfg.analysis.loader.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(bright) = var("FV_BRIGHT_DB") {
            cfg.analysis.detector.bright_threshold =
                bright.trim().parse().with_context(|| format!("FV_BRIGHT_DB={bright}"))?;
        }
        if let Some(dark) = var("FV_DARK_DB") {
            cfg.analysis.detector.dark_threshold = dark.trim().parse().with_context(|| format!("FV_DARK_DB={dark}"))?;
        }
        cfg.overlay_dir = var("FV_OVERLAY_DIR").map(PathBuf::from);
        Ok(cfg)
    }
}
