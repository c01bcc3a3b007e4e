use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tunevault_auth::{
    generate_token, hash_password, hash_token, validate_password_plaintext,
    validate_token_plaintext, TokenScope, SONGS_READ,
};
use tunevault_auth::token::ACTIVATION_TOKEN_TTL;
use tunevault_core::validation::matches_email;
use tunevault_core::Validator;
use tunevault_storage::{NewUser, StorageError};

use crate::error::{validation_failed, ApiError};
use crate::ApiState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RegisterUserInput {
    name: String,
    email: String,
    password: String,
}

pub(crate) async fn register_user(
    State(state): State<ApiState>,
    body: Result<Json<RegisterUserInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut v = Validator::new();
    v.check(!input.name.is_empty(), "name", "must be provided");
    v.check(
        input.name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    v.check(!input.email.is_empty(), "email", "must be provided");
    v.check(
        matches_email(&input.email),
        "email",
        "must be a valid email address",
    );
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(validation_failed(v.into_errors()));
    }

    let password_hash =
        hash_password(&input.password).map_err(|error| ApiError::Internal(error.to_string()))?;
    let new_user = NewUser {
        name: input.name,
        email: input.email,
        password_hash,
    };
    let user = match state.storage().insert_user(&new_user).await {
        Ok(user) => user,
        Err(StorageError::DuplicateEmail) => {
            v.add_error("email", "a user with this email address already exists");
            return Err(validation_failed(v.into_errors()));
        }
        Err(error) => return Err(error.into()),
    };

    state
        .storage()
        .grant_permissions(user.id, &[SONGS_READ])
        .await?;

    // Email delivery is out of scope; the one-time activation token goes
    // back to the caller for out-of-band delivery.
    let token = generate_token(user.id, ACTIVATION_TOKEN_TTL, TokenScope::Activation);
    state.storage().insert_token(&token).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "activation_token": token.plaintext })),
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ActivateUserInput {
    token: String,
}

pub(crate) async fn activate_user(
    State(state): State<ApiState>,
    body: Result<Json<ActivateUserInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = body.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(validation_failed(v.into_errors()));
    }

    let mut user = match state
        .storage()
        .get_user_for_token(TokenScope::Activation, &hash_token(&input.token))
        .await
    {
        Ok(user) => user,
        Err(StorageError::RecordNotFound) => {
            v.add_error("token", "invalid or expired activation token");
            return Err(validation_failed(v.into_errors()));
        }
        Err(error) => return Err(error.into()),
    };

    user.activated = true;
    // CAS on the user version: a concurrent activation surfaces as a 409.
    let user = state.storage().update_user(&user).await?;
    state
        .storage()
        .delete_tokens_for_user(TokenScope::Activation, user.id)
        .await?;

    Ok(Json(json!({ "user": user })).into_response())
}
