// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::common::error::ErrorCapture;
use crate::modules::common::log::Tracing;
use crate::modules::common::signal::SIGNAL_MANAGER;
use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::rest::public::status::get_status;
use crate::modules::settings::cli::SETTINGS;

use super::error::ApiErrorResponse;
use crate::raise_error;
use api::create_openapi_service;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::{CatchPanic, Compression, Cors};
use poem::{EndpointExt, Route, Server};
use std::time::Duration;

pub mod api;
pub mod public;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

const DESCRIPTION: &str = r#"
    MailSift keeps a search index in step with one IMAP folder.

    - Watches the folder with IDLE, or polls when the server cannot push.
    - Cleans every new message and scores it; only substantive mail is indexed.
    - Remembers what was handled, so restarts never index a message twice.
"#;

pub async fn start_http_server() -> MailSiftResult<()> {
    let listener = TcpListener::bind((
        SETTINGS
            .mailsift_bind_ip
            .clone()
            .unwrap_or("0.0.0.0".into()),
        SETTINGS.mailsift_http_port,
    ));

    let api_service = create_openapi_service()
        .description(DESCRIPTION)
        .summary("Quality-filtered incremental mailbox indexing");

    let swagger = api_service.swagger_ui();
    let spec_json = api_service.spec_endpoint();

    let open_api_route = Route::new()
        .nest_no_strip("/api/v1", api_service)
        .with(ErrorCapture)
        .with(Tracing);

    let route = Route::new()
        .nest("/api-docs/swagger", swagger)
        .nest("/api-docs/spec.json", spec_json)
        .nest("/api/status", get(get_status))
        .nest_no_strip("/api/v1", open_api_route)
        .with(Cors::new())
        .with(Compression::new())
        .with(CatchPanic::new());

    let mut shutdown = SIGNAL_MANAGER.subscribe();
    let server = Server::new(listener)
        .name("MailSift API Service")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            route,
            async move {
                let _ = shutdown.recv().await;
            },
            Some(Duration::from_secs(5)),
        );
    tracing::info!(
        "MailSift API Service is now running on port {}.",
        SETTINGS.mailsift_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}
