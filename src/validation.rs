//! Header based access rules for the contact endpoint.
//!
//! The rules compare raw header values against the configured ones with exact string
//! equality. They keep casual traffic away from the endpoint; they are not an
//! authentication mechanism since every header involved can be forged by the caller.

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequest, RequestParts},
    response::{IntoResponse, Response},
};
use http::{header, HeaderMap, StatusCode};

use crate::{
    client_addr::{ClientAddr, ProxyPolicy},
    configuration::ContactSettings,
    error::ResponseError,
};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Transport metadata of one request, as seen by the access rules.
#[derive(Clone, Debug)]
pub struct AccessContext {
    pub host: Option<String>,
    pub referer: Option<String>,
    pub content_type: Option<String>,
    pub client: ClientAddr,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Unsupported media type.")]
    UnsupportedMediaType,
    #[error("you are not wellcome here.")]
    Forbidden,
}

impl ResponseError for Rejection {
    fn status_code(&self) -> StatusCode {
        match self {
            Rejection::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Rejection::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl AccessContext {
    pub fn new(headers: &HeaderMap, client: ClientAddr) -> Self {
        let value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        AccessContext {
            host: value(header::HOST),
            referer: value(header::REFERER),
            content_type: value(header::CONTENT_TYPE),
            client,
        }
    }

    /// Write the audit record for this request.
    pub fn audit(&self) {
        tracing::info!(
            to = self.host.as_deref().unwrap_or_default(),
            from = %self.client,
            referer = self.referer.as_deref().unwrap_or_default(),
            "contact request received"
        );
    }
}

/// Check a request against the access rules, in order: content type, referer, host.
pub fn validate(context: &AccessContext, settings: &ContactSettings) -> Result<(), Rejection> {
    if context.content_type.as_deref() != Some(JSON_CONTENT_TYPE) {
        return Err(Rejection::UnsupportedMediaType);
    }

    if settings.check_referer
        && context.referer.as_deref().unwrap_or_default() != settings.expected_referer
    {
        return Err(Rejection::Forbidden);
    }

    if context.host.as_deref().unwrap_or_default() != settings.expected_host {
        return Err(Rejection::Forbidden);
    }

    Ok(())
}

/// Rejection type for `AccessContext` when the connection details are not available.
#[derive(Debug, thiserror::Error)]
#[error("missing connection information")]
pub struct MissingConnectInfo;

impl IntoResponse for MissingConnectInfo {
    fn into_response(self) -> Response {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

#[async_trait]
impl<B> FromRequest<B> for AccessContext
where
    B: Send,
{
    type Rejection = MissingConnectInfo;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let extensions = req.extensions().ok_or(MissingConnectInfo)?;
        let ConnectInfo(peer) = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .copied()
            .ok_or(MissingConnectInfo)?;
        let policy = extensions
            .get::<ProxyPolicy>()
            .cloned()
            .ok_or(MissingConnectInfo)?;
        let headers = req.headers().ok_or(MissingConnectInfo)?;

        let client = ClientAddr::resolve(peer, headers, &policy);
        Ok(AccessContext::new(headers, client))
    }
}
