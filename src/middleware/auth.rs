use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::db::StoreError;
use crate::errors::ApiError;
use crate::state::AppState;
use crate::tokens::{validate_token_plaintext, SCOPE_AUTHENTICATION};
use crate::users::User;
use crate::validator::Validator;

/// Request identity, resolved once per request by [`authenticate`] and read
/// by every downstream gate.
#[derive(Debug, Clone)]
pub enum CurrentUser {
    Anonymous,
    Authenticated(User),
}

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        match self {
            CurrentUser::Anonymous => None,
            CurrentUser::Authenticated(user) => Some(user),
        }
    }
}

/// Resolves the Authorization header to a [`CurrentUser`] extension. A
/// missing header is not an error; requests proceed as anonymous and the
/// per-route gates decide what that means.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut response = match resolve_identity(&state, request.headers()).await {
        Ok(current) => {
            request.extensions_mut().insert(current);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    };

    // Caches must key on the Authorization header, on rejections included.
    response
        .headers_mut()
        .append(header::VARY, header::AUTHORIZATION.into());
    response
}

async fn resolve_identity(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> Result<CurrentUser, ApiError> {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_string))
        .transpose()
        .map_err(|_| ApiError::InvalidAuthenticationToken)?;

    match header_value {
        None => Ok(CurrentUser::Anonymous),
        Some(value) => {
            let plaintext = value
                .strip_prefix("Bearer ")
                .ok_or(ApiError::InvalidAuthenticationToken)?;

            let mut v = Validator::new();
            validate_token_plaintext(&mut v, plaintext);
            if !v.valid() {
                return Err(ApiError::InvalidAuthenticationToken);
            }

            match state.users.get_for_token(SCOPE_AUTHENTICATION, plaintext).await {
                Ok(user) => Ok(CurrentUser::Authenticated(user)),
                Err(StoreError::NotFound) => Err(ApiError::InvalidAuthenticationToken),
                Err(err) => Err(err.into()),
            }
        }
    }
}

fn current_user(request: &Request) -> Result<&CurrentUser, ApiError> {
    request.extensions().get::<CurrentUser>().ok_or_else(|| {
        // Only reachable if a gated route was wired up without the
        // authenticate middleware.
        error!("current user extension missing from request");
        ApiError::internal(anyhow::anyhow!("current user extension missing"))
    })
}

pub async fn require_authenticated(request: Request, next: Next) -> Result<Response, ApiError> {
    if current_user(&request)?.user().is_none() {
        return Err(ApiError::AuthenticationRequired);
    }
    Ok(next.run(request).await)
}

pub async fn require_activated(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = current_user(&request)?
        .user()
        .ok_or(ApiError::AuthenticationRequired)?;
    if !user.activated {
        return Err(ApiError::InactiveAccount);
    }
    Ok(next.run(request).await)
}

/// Shared gate: authenticated, activated, and holding `code`.
async fn require_permission(
    state: &AppState,
    request: Request,
    next: Next,
    code: &str,
) -> Result<Response, ApiError> {
    let user = current_user(&request)?
        .user()
        .ok_or(ApiError::AuthenticationRequired)?;
    if !user.activated {
        return Err(ApiError::InactiveAccount);
    }

    let permissions = state.permissions.all_for_user(user.id).await?;
    if !permissions.includes(code) {
        return Err(ApiError::NotPermitted);
    }

    Ok(next.run(request).await)
}

pub async fn require_movies_read(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_permission(&state, request, next, crate::permissions::MOVIES_READ).await
}

pub async fn require_movies_write(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_permission(&state, request, next, crate::permissions::MOVIES_WRITE).await
}
