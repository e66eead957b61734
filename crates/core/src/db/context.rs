use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::db::{load_report_config, KbLayout, ReportConfig};

/// Layout plus loaded config, with configured paths resolved against the root.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub layout: KbLayout,
    pub config: ReportConfig,
    pub db_path: PathBuf,
    pub definitions_dir: PathBuf,
}

impl ReportContext {
    /// Load the config (or defaults) for a given root.
    pub fn from_root(root: impl AsRef<Path>) -> Result<Self> {
        Self::from_layout(KbLayout::new(root))
    }

    /// Load the config named by `layout.config_path`; relative paths in it resolve against the root.
    pub fn from_layout(layout: KbLayout) -> Result<Self> {
        let config = load_report_config(&layout)?;
        let db_path = layout.resolve(&config.db.path);
        let definitions_dir = layout.resolve(&config.definitions_dir);
        Ok(Self { layout, config, db_path, definitions_dir })
    }

    /// Override the knowledge-base location (e.g., from `--db`).
    pub fn with_db_path(mut self, db_path: Option<PathBuf>) -> Self {
        if let Some(path) = db_path {
            self.db_path = path;
        }
        self
    }
}
