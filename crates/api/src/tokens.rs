use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use tunevault_auth::token::AUTHENTICATION_TOKEN_TTL;
use tunevault_auth::{generate_token, verify_password, TokenScope};
use tunevault_core::validation::matches_email;
use tunevault_core::Validator;
use tunevault_storage::StorageError;

use crate::error::{validation_failed, ApiError};
use crate::ApiState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CreateAuthenticationTokenInput {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct IssuedToken {
    token: String,
    #[serde(with = "time::serde::rfc3339")]
    expiry: OffsetDateTime,
}

pub(crate) async fn create_authentication_token(
    State(state): State<ApiState>,
    body: Result<Json<CreateAuthenticationTokenInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut v = Validator::new();
    v.check(!input.email.is_empty(), "email", "must be provided");
    v.check(
        matches_email(&input.email),
        "email",
        "must be a valid email address",
    );
    v.check(!input.password.is_empty(), "password", "must be provided");
    if !v.valid() {
        return Err(validation_failed(v.into_errors()));
    }

    let user = match state.storage().get_user_by_email(&input.email).await {
        Ok(user) => user,
        // Unknown email and wrong password are indistinguishable on the wire.
        Err(StorageError::RecordNotFound) => return Err(ApiError::InvalidCredentials),
        Err(error) => return Err(error.into()),
    };
    if !verify_password(&input.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = generate_token(user.id, AUTHENTICATION_TOKEN_TTL, TokenScope::Authentication);
    state.storage().insert_token(&token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "authentication_token": IssuedToken {
                token: token.plaintext,
                expiry: token.expiry,
            }
        })),
    )
        .into_response())
}
