// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use crate::modules::error::code::ErrorCode;
use crate::modules::error::{MailSiftError, MailSiftResult};
use crate::modules::imap::credentials::{Encryption, ImapCredentials};
use crate::modules::imap::session::{ImapSession, SessionStream};
use crate::modules::utils::net::establish_tcp_connection_with_timeout;
use crate::modules::utils::net::establish_tls_connection;
use crate::modules::utils::net::NetTimeouts;
use crate::modules::utils::tls::establish_tls_stream;
use crate::raise_error;
use async_imap::error::Error as ImapError;
use async_imap::Client as ImapClient;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::ops::Deref;
use std::ops::DerefMut;
use tokio::io::BufWriter;
use tracing::debug;

#[derive(Debug)]
pub(crate) struct Client {
    inner: ImapClient<Box<dyn SessionStream>>,
}

impl Deref for Client {
    type Target = ImapClient<Box<dyn SessionStream>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Client {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

fn alpn(port: u16) -> &'static [&'static str] {
    if port == 993 {
        &[]
    } else {
        &["imap"]
    }
}

/// Maps a failed command to the error taxonomy: a server refusal of the
/// credentials is fatal, a broken transport is retried.
pub(crate) fn classify_imap_error(error: ImapError, code_on_refusal: ErrorCode) -> MailSiftError {
    match error {
        ImapError::No(message) | ImapError::Bad(message) => {
            raise_error!(message, code_on_refusal)
        }
        ImapError::Io(e) => raise_error!(e.to_string(), ErrorCode::NetworkError),
        ImapError::ConnectionLost => raise_error!(
            "IMAP connection lost".into(),
            ErrorCode::NetworkError
        ),
        other => raise_error!(format!("{:#?}", other), ErrorCode::ImapCommandFailed),
    }
}

impl Client {
    fn new(stream: Box<dyn SessionStream>) -> Self {
        Self {
            inner: ImapClient::new(stream),
        }
    }

    pub(crate) async fn login(self, username: &str, password: &str) -> MailSiftResult<ImapSession> {
        let Client { inner, .. } = self;
        let session = inner
            .login(username, password)
            .await
            .map_err(|(e, _)| classify_imap_error(e, ErrorCode::ImapAuthenticationFailed))?;
        Ok(session)
    }

    pub async fn connection(
        credentials: &ImapCredentials,
        timeouts: NetTimeouts,
    ) -> MailSiftResult<Self> {
        let domain = &credentials.host;
        let resolved_addr = Self::resolve_to_socket_addr(domain, credentials.port)?;
        debug!("Attempting IMAP connection to {domain} ({resolved_addr}).");
        match credentials.encryption {
            Encryption::Ssl => {
                Self::establish_secure_connection(resolved_addr, domain, timeouts).await
            }
            Encryption::StartTls => {
                Self::establish_starttls_connection(resolved_addr, domain, timeouts).await
            }
            Encryption::None => Self::establish_insecure_connection(resolved_addr, timeouts).await,
        }
    }

    async fn read_greeting(&mut self) -> MailSiftResult<()> {
        let _greeting = self
            .read_response()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?
            .ok_or_else(|| {
                raise_error!(
                    "failed to read greeting".into(),
                    ErrorCode::NetworkError
                )
            })?;
        Ok(())
    }

    async fn establish_secure_connection(
        address: SocketAddr,
        server_hostname: &str,
        timeouts: NetTimeouts,
    ) -> MailSiftResult<Self> {
        let tls_stream =
            establish_tls_connection(address, server_hostname, alpn(address.port()), timeouts)
                .await?;
        let buffered_stream = BufWriter::new(tls_stream);
        let session_stream: Box<dyn SessionStream> = Box::new(buffered_stream);
        let mut client = Client::new(session_stream);
        client.read_greeting().await?;
        Ok(client)
    }

    async fn establish_insecure_connection(
        address: SocketAddr,
        timeouts: NetTimeouts,
    ) -> MailSiftResult<Self> {
        let tcp_stream = establish_tcp_connection_with_timeout(address, timeouts).await?;
        let buffered_stream = BufWriter::new(tcp_stream);
        let session_stream: Box<dyn SessionStream> = Box::new(buffered_stream);
        let mut client = Client::new(session_stream);
        client.read_greeting().await?;
        Ok(client)
    }

    async fn establish_starttls_connection(
        address: SocketAddr,
        server_hostname: &str,
        timeouts: NetTimeouts,
    ) -> MailSiftResult<Self> {
        let tcp_stream = establish_tcp_connection_with_timeout(address, timeouts).await?;
        let buffered_tcp_stream = BufWriter::new(tcp_stream);
        let mut client = async_imap::Client::new(buffered_tcp_stream);

        let _greeting = client
            .read_response()
            .await
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?
            .ok_or_else(|| {
                raise_error!(
                    "failed to read greeting".into(),
                    ErrorCode::NetworkError
                )
            })?;

        client
            .run_command_and_check_ok("STARTTLS", None)
            .await
            .map_err(|_| {
                raise_error!(
                    "STARTTLS command failed".into(),
                    ErrorCode::ImapCommandFailed
                )
            })?;

        // the TLS handshake runs on the raw socket, not the buffered writer
        let tcp_stream = client.into_inner().into_inner();
        let tls_stream = establish_tls_stream(server_hostname, &[], tcp_stream).await?;
        let buffered_stream = BufWriter::new(tls_stream);
        let session_stream: Box<dyn SessionStream> = Box::new(buffered_stream);
        Ok(Client::new(session_stream))
    }

    fn resolve_to_socket_addr(domain: &str, port: u16) -> MailSiftResult<SocketAddr> {
        if domain.is_empty() || domain.contains(|c: char| !c.is_ascii() && c != '.') {
            return Err(raise_error!(
                "Invalid domain format".into(),
                ErrorCode::MissingConfiguration
            ));
        }
        let address = format!("{}:{}", domain, port);

        let socket_addrs = address
            .to_socket_addrs()
            .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::NetworkError))?;

        socket_addrs.into_iter().next().ok_or_else(|| {
            raise_error!("Unable to resolve address".into(), ErrorCode::NetworkError)
        })
    }
}
