// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::context::Initialize;
use crate::modules::error::{code::ErrorCode, MailSiftError, MailSiftResult};
use crate::modules::settings::dir::DATA_DIR_MANAGER;
use crate::modules::sink::local::INDEX_MODELS;
use crate::modules::state::STATE_MODELS;
use crate::raise_error;
use native_db::{Builder, Database, Models};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::info;

static DB_MANAGER: OnceLock<DatabaseManager> = OnceLock::new();

pub struct DatabaseManager {
    /// Sync cursor, seen set and counters per mailbox
    state_db: Arc<Database<'static>>,
    /// Local index written by the local sink
    index_db: Arc<Database<'static>>,
}

impl DatabaseManager {
    pub fn get() -> MailSiftResult<&'static DatabaseManager> {
        DB_MANAGER.get().ok_or_else(|| {
            raise_error!(
                "Database manager used before initialization".into(),
                ErrorCode::InternalError
            )
        })
    }

    pub fn state_db(&self) -> &Arc<Database<'static>> {
        &self.state_db
    }

    pub fn index_db(&self) -> &Arc<Database<'static>> {
        &self.index_db
    }

    pub fn open(models: &'static Models, path: PathBuf) -> MailSiftResult<Arc<Database<'static>>> {
        info!("Opening database at: {:?}", &path);
        let mut database = Builder::new()
            .create(models, path)
            .map_err(Self::handle_database_error)?;
        database
            .compact()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))?;
        Ok(Arc::new(database))
    }

    pub fn in_memory(models: &'static Models) -> MailSiftResult<Arc<Database<'static>>> {
        Builder::new()
            .create_in_memory(models)
            .map(Arc::new)
            .map_err(Self::handle_database_error)
    }

    fn handle_database_error(error: native_db::db_type::Error) -> MailSiftError {
        match error {
            native_db::db_type::Error::RedbDatabaseError(database_error) => match database_error {
                redb::DatabaseError::DatabaseAlreadyOpen => {
                    raise_error!(
                        "Database is already open by another instance".into(),
                        ErrorCode::InternalError
                    )
                }
                other => {
                    raise_error!(
                        format!("Database error: {:?}", other),
                        ErrorCode::InternalError
                    )
                }
            },
            other => {
                raise_error!(
                    format!("Failed to create database: {:?}", other),
                    ErrorCode::InternalError
                )
            }
        }
    }
}

impl Initialize for DatabaseManager {
    async fn initialize() -> MailSiftResult<()> {
        let state_db = Self::open(&STATE_MODELS, DATA_DIR_MANAGER.state_db.clone())?;
        let index_db = Self::open(&INDEX_MODELS, DATA_DIR_MANAGER.index_db.clone())?;
        let _ = DB_MANAGER.set(DatabaseManager { state_db, index_db });
        Ok(())
    }
}
