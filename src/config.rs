use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PASS_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub user: Option<String>,
    pub certification: Option<String>,
    pub bank_dir: Option<PathBuf>,
    pub pass_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            certification: None,
            bank_dir: None,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

impl Config {
    /// Threshold clamped into a usable percentage
    pub fn pass_threshold(&self) -> f64 {
        if self.pass_threshold.is_finite() {
            self.pass_threshold.clamp(0.0, 100.0)
        } else {
            DEFAULT_PASS_THRESHOLD
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "certquiz") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("certquiz_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!("ignoring unreadable config {}: {e}", self.path.display()),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
