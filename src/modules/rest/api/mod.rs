// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem_openapi::{OpenApiService, Tags};
use sync::SyncApi;

use crate::mailsift_version;

pub mod sync;

#[derive(Tags)]
pub enum ApiTags {
    Sync,
}

pub fn create_openapi_service() -> OpenApiService<SyncApi, ()> {
    OpenApiService::new(SyncApi, "MailSiftApi", mailsift_version!())
}
