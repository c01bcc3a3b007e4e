use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::{AUTHORIZATION, VARY};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tunevault_auth::{hash_token, TokenScope, TOKEN_PLAINTEXT_LENGTH};
use tunevault_storage::{StorageError, User};

use crate::error::ApiError;
use crate::ApiState;

/// The identity resolved for the current request. A missing Authorization
/// header is not an error by itself; anonymous requests are turned away
/// only at permission-gated routes.
#[derive(Debug, Clone)]
pub(crate) enum AuthUser {
    Anonymous,
    Authenticated(User),
}

/// Router-wide middleware: resolves the bearer token, attaches the identity
/// to the request, and marks responses as varying on Authorization.
pub(crate) async fn authenticate(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = match request.headers().get(AUTHORIZATION) {
        None => AuthUser::Anonymous,
        Some(header) => match resolve_bearer(&state, header).await {
            Ok(user) => AuthUser::Authenticated(user),
            Err(error) => return error.into_response(),
        },
    };
    request.extensions_mut().insert(identity);

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .append(VARY, HeaderValue::from_static("Authorization"));
    response
}

async fn resolve_bearer(state: &ApiState, header: &HeaderValue) -> Result<User, ApiError> {
    let value = header
        .to_str()
        .map_err(|_| ApiError::InvalidAuthenticationToken)?;
    let plaintext = value
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidAuthenticationToken)?;
    if plaintext.len() != TOKEN_PLAINTEXT_LENGTH {
        return Err(ApiError::InvalidAuthenticationToken);
    }

    match state
        .storage()
        .get_user_for_token(TokenScope::Authentication, &hash_token(plaintext))
        .await
    {
        Ok(user) => Ok(user),
        Err(StorageError::RecordNotFound) => Err(ApiError::InvalidAuthenticationToken),
        Err(error) => Err(error.into()),
    }
}

/// One named guard in the route table: a permission code plus the state to
/// check it against. Applied per handler, so sibling methods on the same
/// path can require different codes.
#[derive(Clone)]
pub(crate) struct PermissionGuard {
    state: ApiState,
    code: &'static str,
}

impl PermissionGuard {
    pub(crate) fn new(state: &ApiState, code: &'static str) -> Self {
        Self {
            state: state.clone(),
            code,
        }
    }
}

/// Gate middleware: anonymous → 401, unactivated → 403, missing code → 403.
/// The wrapped handler runs only when every check passes.
pub(crate) async fn require_permission(
    State(guard): State<PermissionGuard>,
    request: Request,
    next: Next,
) -> Response {
    let identity = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .unwrap_or(AuthUser::Anonymous);

    let user = match identity {
        AuthUser::Anonymous => return ApiError::AuthenticationRequired.into_response(),
        AuthUser::Authenticated(user) => user,
    };
    if !user.activated {
        return ApiError::InactiveAccount.into_response();
    }

    let permissions = match guard.state.storage().permissions_for_user(user.id).await {
        Ok(permissions) => permissions,
        Err(error) => return ApiError::from(error).into_response(),
    };
    if !permissions.includes(guard.code) {
        return ApiError::NotPermitted.into_response();
    }

    next.run(request).await
}

/// Outer middleware: one token per request, keyed by the peer address. A
/// request with no connect info (only possible when the service is driven
/// in-process) bypasses the limiter.
pub(crate) async fn rate_limit(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        if !state.limiter().allow(peer.ip()).await {
            return ApiError::RateLimited.into_response();
        }
    }
    next.run(request).await
}
