// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use poem::{Endpoint, IntoResponse, Middleware, Request, Response, Result};
use poem_openapi::payload::Json;

use crate::modules::error::{code::ErrorCode, ApiError, ApiErrorResponse, MailSiftError};

/// Renders every error leaving the API as the `{code, message}` JSON body.
pub struct ErrorCapture;

pub struct ErrorCaptureEndpoint<E> {
    ep: E,
}

impl<E: Endpoint> Middleware<E> for ErrorCapture {
    type Output = ErrorCaptureEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        ErrorCaptureEndpoint { ep }
    }
}

impl<E: Endpoint> Endpoint for ErrorCaptureEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        match self.ep.call(req).await {
            Ok(response) => Ok(response.into_response()),
            Err(error) => Ok(render_error(error)),
        }
    }
}

fn classify(error: &poem::Error) -> Option<ErrorCode> {
    if error.is::<poem::error::NotFoundError>() {
        return Some(ErrorCode::ResourceNotFound);
    }
    if error.is::<poem::error::MethodNotAllowedError>() {
        return Some(ErrorCode::MethodNotAllowed);
    }
    let bad_request = error.is::<poem::error::ParsePathError>()
        || error.is::<poem::error::ParseQueryError>()
        || error.is::<poem::error::ParseJsonError>()
        || error.is::<poem_openapi::error::ParseRequestPayloadError>()
        || error.is::<poem_openapi::error::ContentTypeError>()
        || error.is::<poem_openapi::error::ParseParamError>();
    if bad_request {
        return Some(ErrorCode::InvalidParameter);
    }
    if error.has_source() {
        return Some(ErrorCode::UnhandledPoemError);
    }
    None
}

pub fn render_error(error: poem::Error) -> Response {
    if error.is::<MailSiftError>() {
        return error.into_response();
    }
    match classify(&error) {
        Some(code) => {
            let status = error.status();
            let api_error = ApiError::new_with_error_code(&error, code as u32);
            let mut response =
                ApiErrorResponse::Generic(code.status(), Json(api_error)).into_response();
            response.set_status(status);
            response
        }
        None => error.into_response(),
    }
}
