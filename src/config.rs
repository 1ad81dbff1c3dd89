use std::env;
use std::path::PathBuf;

use crate::errors::{Result, StashError};

pub const HOME_ENV: &str = "TOKSTASH_HOME";

pub struct AppPaths {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub exports_dir: PathBuf,
}

impl AppPaths {
    /// `$TOKSTASH_HOME` when set, otherwise `~/.tokstash`.
    pub fn new() -> Result<Self> {
        Self::resolve(|key| env::var(key).ok())
    }

    pub fn resolve(env_lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(base) = env_lookup(HOME_ENV).filter(|value| !value.trim().is_empty()) {
            return Ok(Self::from_base(PathBuf::from(base.trim())));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| StashError::Config("could not determine home directory".into()))?;
        Ok(Self::from_base(home.join(".tokstash")))
    }

    pub fn from_base(base: PathBuf) -> Self {
        Self {
            db_path: base.join("tokstash.db"),
            exports_dir: base.join("exports"),
            base_dir: base,
        }
    }

    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.db_path = db_path;
        self
    }
}
