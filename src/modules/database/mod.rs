// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::{MailSiftError, MailSiftResult};
use crate::raise_error;
use native_db::transaction::{RTransaction, RwTransaction};
use native_db::*;
use std::fmt::Debug;
use std::sync::Arc;

use super::error::code::ErrorCode;
pub mod manager;

pub struct ModelsAdapter {
    pub models: Models,
}

impl ModelsAdapter {
    pub fn new() -> Self {
        ModelsAdapter {
            models: Models::new(),
        }
    }

    pub fn register_model<T: ToInput>(&mut self) {
        self.models.define::<T>().expect("failed to define model ");
    }
}

fn db_error(e: impl Debug) -> MailSiftError {
    raise_error!(format!("{:#?}", e), ErrorCode::InternalError)
}

/// Runs `op` inside a read transaction on the blocking pool.
async fn with_read<R, F>(database: &Arc<Database<'static>>, op: F) -> MailSiftResult<R>
where
    R: Send + 'static,
    F: FnOnce(&RTransaction) -> MailSiftResult<R> + Send + 'static,
{
    let db = database.clone();
    tokio::task::spawn_blocking(move || {
        let r_transaction = db.r_transaction().map_err(db_error)?;
        op(&r_transaction)
    })
    .await
    .map_err(db_error)?
}

/// Runs `op` inside a write transaction on the blocking pool, committing on success.
async fn with_write<R, F>(database: &Arc<Database<'static>>, op: F) -> MailSiftResult<R>
where
    R: Send + 'static,
    F: FnOnce(&RwTransaction) -> MailSiftResult<R> + Send + 'static,
{
    let db = database.clone();
    tokio::task::spawn_blocking(move || {
        let rw_transaction = db.rw_transaction().map_err(db_error)?;
        let result = op(&rw_transaction)?;
        rw_transaction.commit().map_err(db_error)?;
        Ok(result)
    })
    .await
    .map_err(db_error)?
}

pub async fn upsert_impl<T: ToInput + Clone + Send + 'static>(
    database: &Arc<Database<'static>>,
    item: T,
) -> MailSiftResult<()> {
    with_write(database, move |rw| {
        rw.upsert(item).map_err(db_error)?;
        Ok(())
    })
    .await
}

pub async fn async_find_impl<T: ToInput + Clone + Send + 'static>(
    database: &Arc<Database<'static>>,
    key: impl ToKey + Send + 'static,
) -> MailSiftResult<Option<T>> {
    with_read(database, move |r| r.get().primary(key).map_err(db_error)).await
}

/// Removes the entity stored under `key`; returns whether one existed.
pub async fn delete_by_key_impl<T: ToInput + Clone + Send + 'static>(
    database: &Arc<Database<'static>>,
    key: impl ToKey + Send + 'static,
) -> MailSiftResult<bool> {
    with_write(database, move |rw| {
        let Some(existing) = rw.get().primary::<T>(key).map_err(db_error)? else {
            return Ok(false);
        };
        rw.remove::<T>(existing).map_err(db_error)?;
        Ok(true)
    })
    .await
}

pub async fn count_impl<T: ToInput + Clone + Send + 'static>(
    database: &Arc<Database<'static>>,
) -> MailSiftResult<u64> {
    with_read(database, |r| r.len().primary::<T>().map_err(db_error)).await
}
