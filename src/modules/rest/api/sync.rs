// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::rest::api::ApiTags;
use crate::modules::rest::ApiResult;
use crate::modules::sync::engine::SyncEngine;
use crate::modules::sync::stats::SyncStatistics;
use poem_openapi::payload::Json;
use poem_openapi::OpenApi;

pub struct SyncApi;

#[OpenApi(prefix_path = "/api/v1", tag = "ApiTags::Sync")]
impl SyncApi {
    /// Current counters, watcher state and recent decisions of the sync engine.
    #[oai(method = "get", path = "/status", operation_id = "get_sync_status")]
    async fn get_sync_status(&self) -> ApiResult<Json<SyncStatistics>> {
        let engine = SyncEngine::get()?;
        Ok(Json(engine.get_statistics().await))
    }

    /// Starts watching the mailbox. Fails when the engine is already running.
    #[oai(method = "post", path = "/start", operation_id = "start_sync")]
    async fn start_sync(&self) -> ApiResult<Json<SyncStatistics>> {
        let engine = SyncEngine::get()?;
        engine.start().await?;
        Ok(Json(engine.get_statistics().await))
    }

    /// Stops the engine after in-flight work is checkpointed. Stopping an idle engine is a no-op.
    #[oai(method = "post", path = "/stop", operation_id = "stop_sync")]
    async fn stop_sync(&self) -> ApiResult<Json<SyncStatistics>> {
        let engine = SyncEngine::get()?;
        engine.stop().await?;
        Ok(Json(engine.get_statistics().await))
    }

    /// Forgets the cursor, the seen identifiers and the counters.
    ///
    /// The engine must be stopped first; the next start lists the folder as on first run.
    #[oai(method = "post", path = "/reset", operation_id = "reset_sync")]
    async fn reset_sync(&self) -> ApiResult<Json<SyncStatistics>> {
        let engine = SyncEngine::get()?;
        engine.reset().await?;
        Ok(Json(engine.get_statistics().await))
    }
}
