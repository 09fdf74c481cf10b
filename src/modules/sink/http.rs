// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::time::Duration;

use tracing::debug;

use crate::modules::error::code::ErrorCode;
use crate::modules::error::MailSiftResult;
use crate::modules::sink::{IndexedDocument, IndexingSink};
use crate::{mailsift_version, raise_error};

/// Upserts documents into a remote index with `PUT <base>/<id>`.
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(base_url: &str, timeout: Duration) -> MailSiftResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(format!("MailSift/{}", mailsift_version!()))
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                raise_error!(
                    format!("Failed to build HTTP client: {:#?}", e),
                    ErrorCode::InternalError
                )
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(id))
    }
}

impl IndexingSink for HttpSink {
    async fn submit(&self, document: IndexedDocument) -> MailSiftResult<()> {
        let url = self.document_url(&document.id);
        debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .json(&document)
            .send()
            .await
            .map_err(|e| {
                raise_error!(
                    format!("Index endpoint unreachable ({}): {:#?}", url, e),
                    ErrorCode::SinkUnavailable
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(raise_error!(
                format!("Index endpoint answered {} for '{}': {}", status, document.id, body),
                ErrorCode::SinkUnavailable
            ));
        }
        Ok(())
    }
}
