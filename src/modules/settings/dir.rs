// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::context::Initialize;
use crate::modules::settings::cli::SETTINGS;
use crate::{
    modules::error::{code::ErrorCode, MailSiftResult},
    raise_error,
};
use std::path::PathBuf;
use std::sync::LazyLock;

pub const STATE_FILE: &str = "state.db";
pub const INDEX_FILE: &str = "index.db";
const LOG_DIR: &str = "logs";

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> =
    LazyLock::new(|| DataDirManager::new(PathBuf::from(&SETTINGS.mailsift_root_dir)));

#[derive(Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    /// Sync cursor, seen set and counters.
    pub state_db: PathBuf,
    /// Documents written by the local index sink.
    pub index_db: PathBuf,
    pub log_dir: PathBuf,
}

impl Initialize for DataDirManager {
    async fn initialize() -> MailSiftResult<()> {
        DATA_DIR_MANAGER.ensure_dirs()
    }
}

impl DataDirManager {
    pub fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir: root_dir.clone(),
            state_db: root_dir.join(STATE_FILE),
            index_db: root_dir.join(INDEX_FILE),
            log_dir: root_dir.join(LOG_DIR),
        }
    }

    pub fn ensure_dirs(&self) -> MailSiftResult<()> {
        for dir in [&self.root_dir, &self.log_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_are_rooted() {
        let temp_dir = tempdir().unwrap();
        let manager = DataDirManager::new(temp_dir.path().to_path_buf());
        assert!(manager.state_db.ends_with("state.db"));
        assert!(manager.index_db.ends_with("index.db"));
        assert!(manager.log_dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_ensure_dirs_creates_log_dir() {
        let temp_dir = tempdir().unwrap();
        let manager = DataDirManager::new(temp_dir.path().join("nested").join("data"));
        manager.ensure_dirs().unwrap();
        assert!(manager.root_dir.is_dir());
        assert!(manager.log_dir.is_dir());
        // idempotent
        manager.ensure_dirs().unwrap();
    }
}
