use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use time::Duration;
use tracing::{debug, error, instrument};

use crate::db::StoreError;
use crate::errors::ApiError;
use crate::mailer::Template;
use crate::state::AppState;
use crate::tokens::repo::{SCOPE_ACTIVATION, SCOPE_AUTHENTICATION};
use crate::users::password::{validate_password_plaintext, verify_password};
use crate::users::validate_email;
use crate::validator::Validator;

/// The resend endpoint answers identically whether or not the email maps to
/// an account, so the response cannot be used to probe for registrations.
const GENERIC_ACTIVATION_MESSAGE: &str =
    "an email will be sent to you containing activation instructions";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAuthTokenRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResendActivationRequest {
    #[serde(default)]
    pub email: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tokens/authentication", post(create_authentication_token))
        .route("/tokens/activation", post(resend_activation_token))
}

#[instrument(skip(state, payload))]
pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<CreateAuthTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let user = match state.users.get_by_email(&input.email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(err) => return Err(err.into()),
    };

    let matches =
        verify_password(&input.password, &user.password_hash).map_err(ApiError::internal)?;
    if !matches {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state
        .tokens
        .new_token(user.id, Duration::hours(24), SCOPE_AUTHENTICATION)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authentication_token": token })),
    ))
}

#[instrument(skip(state, payload))]
pub async fn resend_activation_token(
    State(state): State<AppState>,
    payload: Result<Json<ResendActivationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    match state.users.get_by_email(&input.email).await {
        Ok(user) if user.activated => {
            debug!(user_id = user.id, "account already activated, nothing to resend");
        }
        Ok(user) => {
            let token = state
                .tokens
                .new_token(user.id, Duration::days(3), SCOPE_ACTIVATION)
                .await?;

            let mailer = state.mailer.clone();
            let recipient = user.email.clone();
            let data = json!({ "activation_token": token.plaintext });
            state.spawn_background("activation email", async move {
                if let Err(err) = mailer.send(&recipient, Template::ActivationToken, data).await {
                    error!(error = %err, "failed to send activation email");
                }
            });
        }
        Err(StoreError::NotFound) => {
            debug!("no account for requested activation resend");
        }
        Err(err) => return Err(err.into()),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": GENERIC_ACTIVATION_MESSAGE })),
    ))
}
