// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::{
    modules::{
        error::{code::ErrorCode, MailSiftResult},
        imap::session::SessionStream,
    },
    raise_error,
};
use rustls::RootCertStore;
use std::sync::{Arc, LazyLock};

// Built once, every mailbox connection shares the same trust roots.
static CLIENT_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.into(),
    };
    Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    )
});

pub async fn establish_tls_stream(
    server_hostname: &str,
    alpn_protocols: &[&str],
    stream: impl SessionStream + 'static,
) -> MailSiftResult<Box<dyn SessionStream>> {
    let config = if alpn_protocols.is_empty() {
        CLIENT_CONFIG.clone()
    } else {
        let mut config = (**CLIENT_CONFIG).clone();
        config.alpn_protocols = alpn_protocols
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect();
        Arc::new(config)
    };

    let tls_connector = tokio_rustls::TlsConnector::from(config);

    let server_name = rustls_pki_types::ServerName::try_from(server_hostname)
        .map_err(|_| {
            raise_error!(
                format!("Invalid DNS name: {}", server_hostname),
                ErrorCode::InvalidParameter
            )
        })?
        .to_owned();

    let tls_stream = tls_connector
        .connect(server_name, stream)
        .await
        .map_err(|e| raise_error!(e.to_string(), ErrorCode::NetworkError))?;

    Ok(Box::new(tls_stream))
}
