//! Application settings.

use std::fs;
use std::path::PathBuf;

use super::DEFAULT_DATABASE_FILENAME;

/// Default output subdirectory name.
const OUTPUT_SUBDIR: &str = "output";

/// Default number of browser workers.
pub const DEFAULT_WORKERS: usize = 2;

/// Effective paths and run options.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub database_filename: String,
    /// Where JSON artifacts and per-worker partials are written.
    pub output_dir: PathBuf,
    /// Browser workers per site.
    pub workers: usize,
    /// Store merged artifacts in the database after each scrape.
    pub store_results: bool,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kirana");

        Self {
            output_dir: data_dir.join(OUTPUT_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            workers: DEFAULT_WORKERS,
            store_results: false,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            output_dir: data_dir.join(OUTPUT_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Point `data_dir` elsewhere, moving the default output dir along with it.
    pub fn set_data_dir(&mut self, data_dir: PathBuf) {
        if self.output_dir == self.data_dir.join(OUTPUT_SUBDIR) {
            self.output_dir = data_dir.join(OUTPUT_SUBDIR);
        }
        self.data_dir = data_dir;
    }

    /// Full path to the SQLite store.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Merged artifact path for a site, e.g. `output/blinkit_products.json`.
    pub fn artifact_path(&self, site: &str) -> PathBuf {
        self.output_dir.join(format!("{}_products.json", site))
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [("data", &self.data_dir), ("output", &self.output_dir)] {
            tracing::debug!("{} dir: {}", label, dir.display());
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/srv/kirana"));
        assert_eq!(settings.database_path(), PathBuf::from("/srv/kirana/kirana.db"));
        assert_eq!(
            settings.artifact_path("zepto"),
            PathBuf::from("/srv/kirana/output/zepto_products.json")
        );
    }

    #[test]
    fn moving_data_dir_moves_default_output() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/a"));
        settings.set_data_dir(PathBuf::from("/b"));
        assert_eq!(settings.output_dir, PathBuf::from("/b/output"));

        settings.output_dir = PathBuf::from("/elsewhere");
        settings.set_data_dir(PathBuf::from("/c"));
        assert_eq!(settings.output_dir, PathBuf::from("/elsewhere"));
    }

    #[test]
    fn ensure_directories_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path().join("data"));
        settings.ensure_directories().unwrap();
        assert!(settings.output_dir.is_dir());
    }
}
