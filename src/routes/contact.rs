use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Bytes, HttpBody},
    extract::{rejection::BytesRejection, Extension, FromRequest, RequestParts},
    response::{IntoResponse, Redirect, Response},
    BoxError, Json,
};
use http::{StatusCode, Uri};
use serde::Serialize;

use crate::{
    configuration::ContactSettings,
    domain::{FieldLimits, FieldViolation, OutgoingMessage, Submission},
    email_client::MailDispatcher,
    error::{Error, MessageBody},
    validation::{self, AccessContext},
};

#[tracing::instrument(
    name = "Relay a contact submission",
    skip(context, settings, dispatcher, submission),
    fields(client = %context.client)
)]
pub async fn handler(
    context: AccessContext,
    Extension(settings): Extension<Arc<ContactSettings>>,
    Extension(dispatcher): Extension<MailDispatcher>,
    submission: Submission,
) -> Result<Json<MessageBody>, Error> {
    context.audit();

    validation::validate(&context, &settings)?;

    let message = OutgoingMessage::from_submission(submission, settings.recipient.clone());
    dispatcher.dispatch(message);

    Ok(Json(MessageBody::new("email sent.")))
}

/// Send requests for the endpoint without its trailing slash to the canonical path.
///
/// 307 keeps the method and body, so clients re-post the submission.
pub async fn redirect_with_slash(uri: Uri) -> Result<Redirect, StatusCode> {
    let target = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    let target = target.parse::<Uri>().map_err(|_| StatusCode::NOT_FOUND)?;
    Ok(Redirect::temporary(target))
}

/// Rejection type for a `Submission` that could not be read from the request body.
#[derive(Debug)]
pub enum SubmissionRejection {
    Body(BytesRejection),
    Invalid(Vec<FieldViolation>),
}

impl IntoResponse for SubmissionRejection {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Detail {
            detail: Vec<FieldViolation>,
        }

        match self {
            SubmissionRejection::Body(rejection) => rejection.into_response(),
            SubmissionRejection::Invalid(detail) => {
                tracing::info!(violations = ?detail, "invalid submission payload");
                (StatusCode::UNPROCESSABLE_ENTITY, Json(Detail { detail })).into_response()
            }
        }
    }
}

#[async_trait]
impl<B> FromRequest<B> for Submission
where
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = SubmissionRejection;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let limits = req
            .extensions()
            .and_then(|extensions| extensions.get::<Arc<ContactSettings>>())
            .map(|settings| settings.field_limits())
            .unwrap_or_else(FieldLimits::unbounded);

        let body = Bytes::from_request(req)
            .await
            .map_err(SubmissionRejection::Body)?;

        Submission::parse(&body, limits).map_err(SubmissionRejection::Invalid)
    }
}
