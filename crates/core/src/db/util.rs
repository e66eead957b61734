use anyhow::{Context, Result};

use crate::db::{KbLayout, ReportConfig};

/// Load the config JSON for a layout, or defaults when the file does not exist.
pub fn load_report_config(layout: &KbLayout) -> Result<ReportConfig> {
    if !layout.config_path.exists() {
        return Ok(ReportConfig::new(
            layout.relative_to_root(&layout.db_path),
            layout.relative_to_root(&layout.defs_dir),
        ));
    }
    let config_json = std::fs::read_to_string(&layout.config_path)
        .with_context(|| format!("Failed to read config at {}", layout.config_path.display()))?;
    let config: ReportConfig =
        serde_json::from_str(&config_json).context("Failed to parse config JSON")?;
    Ok(config)
}
