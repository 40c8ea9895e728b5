use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{error, instrument};

use crate::db::StoreError;
use crate::errors::ApiError;
use crate::mailer::Template;
use crate::permissions::MOVIES_READ;
use crate::state::AppState;
use crate::tokens::{validate_token_plaintext, SCOPE_ACTIVATION};
use crate::users::dto::{ActivateUserRequest, RegisterUserRequest};
use crate::users::password::hash_password;
use crate::users::repo::{validate_user, User};
use crate::validator::Validator;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register_user))
        .route("/users/activated", put(activate_user))
}

#[instrument(skip(state, payload))]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;

    let mut user = User {
        id: 0,
        created_at: OffsetDateTime::now_utc(),
        name: input.name,
        email: input.email,
        password_hash: String::new(),
        activated: false,
        version: 0,
    };

    let mut v = Validator::new();
    validate_user(&mut v, &user, &input.password);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    user.password_hash = hash_password(&input.password).map_err(ApiError::internal)?;

    match state.users.insert(&mut user).await {
        Ok(()) => {}
        Err(StoreError::DuplicateEmail) => {
            return Err(ApiError::field(
                "email",
                "a user with this email address already exists",
            ));
        }
        Err(err) => return Err(err.into()),
    }

    // New accounts start with read access only; write access is granted out
    // of band.
    state.permissions.add_for_user(user.id, &[MOVIES_READ]).await?;

    let token = state
        .tokens
        .new_token(user.id, Duration::days(3), SCOPE_ACTIVATION)
        .await?;

    let mailer = state.mailer.clone();
    let recipient = user.email.clone();
    let data = json!({
        "user_id": user.id,
        "name": user.name.clone(),
        "activation_token": token.plaintext,
    });
    state.spawn_background("welcome email", async move {
        if let Err(err) = mailer.send(&recipient, Template::UserWelcome, data).await {
            error!(error = %err, "failed to send welcome email");
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({ "user": user }))))
}

#[instrument(skip(state, payload))]
pub async fn activate_user(
    State(state): State<AppState>,
    payload: Result<Json<ActivateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(input) = payload?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let mut user = match state
        .users
        .get_for_token(SCOPE_ACTIVATION, &input.token)
        .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(ApiError::field("token", "invalid or expired activation token"));
        }
        Err(err) => return Err(err.into()),
    };

    user.activated = true;
    // A concurrent update between the token lookup and here surfaces as an
    // edit conflict (409) and the client retries.
    state.users.update(&mut user).await?;

    // Invalidate any sibling activation tokens now that one has been used.
    state
        .tokens
        .delete_all_for_user(SCOPE_ACTIVATION, user.id)
        .await?;

    Ok(Json(json!({ "user": user })))
}
