// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::http::StatusCode;
use poem_openapi::Enum;

#[derive(Copy, Clone, Debug, Enum, Eq, PartialEq)]
#[repr(u32)]
pub enum ErrorCode {
    // Client-side and configuration errors (10000–10999)
    InvalidParameter = 10000,
    MissingConfiguration = 10020,
    Incompatible = 10030,
    MethodNotAllowed = 10090,

    // Authentication errors (20000–20999)
    ImapAuthenticationFailed = 20010,

    // Resource errors (30000–30999)
    ResourceNotFound = 30000,
    AlreadyExists = 30010,

    // Network connection errors (40000–40999)
    NetworkError = 40000,
    ConnectionTimeout = 40010,
    ConnectionPoolTimeout = 40020,

    // Mail service errors (50000–50999)
    ImapCommandFailed = 50000,
    ImapUnexpectedResult = 50020,

    // Indexing sink errors (60000–60999)
    SinkUnavailable = 60000,

    // Internal system errors (70000–70999)
    InternalError = 70000,
    UnhandledPoemError = 70010,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidParameter
            | ErrorCode::MissingConfiguration
            | ErrorCode::Incompatible => StatusCode::BAD_REQUEST,
            ErrorCode::ImapAuthenticationFailed => StatusCode::UNAUTHORIZED,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::SinkUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::NetworkError
            | ErrorCode::ConnectionTimeout
            | ErrorCode::ConnectionPoolTimeout
            | ErrorCode::ImapCommandFailed
            | ErrorCode::ImapUnexpectedResult
            | ErrorCode::InternalError
            | ErrorCode::UnhandledPoemError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Failures that clear up on their own: the connection is re-established
    /// with backoff, or the message is retried on the next cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError
                | ErrorCode::ConnectionTimeout
                | ErrorCode::ConnectionPoolTimeout
                | ErrorCode::ImapCommandFailed
                | ErrorCode::ImapUnexpectedResult
                | ErrorCode::SinkUnavailable
        )
    }

    /// Failures that stop the engine: bad credentials and bad configuration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCode::ImapAuthenticationFailed
                | ErrorCode::MissingConfiguration
                | ErrorCode::InvalidParameter
                | ErrorCode::Incompatible
        )
    }

    /// Failures of the connection as a whole rather than of one message.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkError | ErrorCode::ConnectionPoolTimeout
        )
    }
}
