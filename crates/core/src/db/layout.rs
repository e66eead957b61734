use std::path::{Path, PathBuf};

/// Logical layout of an asm-report home directory.
///
/// This is derived from a chosen root path. It does *not* perform any IO itself.
#[derive(Debug, Clone)]
pub struct KbLayout {
    /// Root directory (`--root` / `ASM_REPORT_HOME`).
    pub root: PathBuf,
    /// Path to the optional config file (JSON), under `.asm-report`.
    pub config_path: PathBuf,
    /// Default path of the live knowledge base.
    pub db_path: PathBuf,
    /// Default definitions directory (defs).
    pub defs_dir: PathBuf,
}

impl KbLayout {
    /// Compute the default layout rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let meta_dir = root.join(".asm-report");
        let config_path = meta_dir.join("config.json");
        let db_path = meta_dir.join("knowledge.db");
        let defs_dir = root.join("defs");

        Self { root, config_path, db_path, defs_dir }
    }

    /// `path` relative to `root` when it lies beneath it, as stored in a fresh config.
    pub fn relative_to_root(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().to_string(),
        }
    }

    /// Resolve a config-relative path against `root`; absolute paths pass through.
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let path = Path::new(configured);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
