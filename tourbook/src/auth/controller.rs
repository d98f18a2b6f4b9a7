//! Signup, login and password flows
//!
//! Every successful flow ends in [`send_token`]: a fresh JWT in the body
//! and in the `jwt` cookie, plus the user without its hidden fields.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use super::jwt::TokenService;
use crate::context::{Identity, RequestContext};
use crate::error::Error;
use crate::handlers::{ApiError, ApiErrorKind, ApiOperation, Payload, SUCCESS};
use crate::mail::Email;
use crate::query::{scope_filter, scope_projection};
use crate::repository::{Document, DocumentStore, Filter, FilterCondition, Projection, Update};
use crate::resources::{Resource, User};
use crate::schema::format_date;
use crate::state::AppState;

/// Minutes a password reset token stays valid
pub const RESET_TOKEN_MINUTES: i64 = 10;

const SIGNUP_FIELDS: [&str; 4] = ["name", "email", "password", "passwordConfirm"];

#[derive(Debug, Serialize)]
struct UserData {
    user: Document,
}

#[derive(Debug, Serialize)]
struct TokenBody {
    status: &'static str,
    token: String,
    data: UserData,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    status: &'static str,
    message: &'static str,
}

fn text<'a>(payload: &'a Document, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

fn visible(user: Document) -> Document {
    scope_projection(&User::read_decorations()).apply(user)
}

fn user_id(user: &Document) -> &str {
    user.get("_id").and_then(Value::as_str).unwrap_or_default()
}

/// Issue a token for `user` and answer with it
pub fn send_token<S: DocumentStore>(
    state: &AppState<S>,
    user: Document,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let token = state.tokens().issue(user_id(&user))?;
    let cookie = state.tokens().session_cookie(&token, state.secure_cookies());
    let body = TokenBody {
        status: SUCCESS,
        token,
        data: UserData { user: visible(user) },
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

fn reset_token_hash(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// Validate `password`/`passwordConfirm` from `payload` and hash the password
fn new_password_hash<S: DocumentStore>(
    state: &AppState<S>,
    payload: &Document,
) -> Result<String, ApiError> {
    let mut candidate = Document::new();
    for field in ["password", "passwordConfirm"] {
        candidate.insert(
            field.to_string(),
            payload.get(field).cloned().unwrap_or(Value::Null),
        );
    }
    let validated = User::schema()
        .validate_update(candidate)
        .map_err(|e| ApiError::from(e).with_operation(ApiOperation::Authenticate))?;
    let password = validated.get("password").and_then(Value::as_str).unwrap_or_default();
    Ok(state.passwords().hash(password)?)
}

fn password_change(hash: String) -> Update {
    let changed_at = Utc::now() - Duration::seconds(1);
    Update::new()
        .set("password", Value::String(hash))
        .set("passwordChangedAt", Value::String(format_date(changed_at)))
        .unset("passwordResetToken")
        .unset("passwordResetExpires")
}

/// `POST /users/signup`
pub async fn signup<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    let input: Document = payload
        .into_iter()
        .filter(|(key, _)| SIGNUP_FIELDS.contains(&key.as_str()))
        .collect();

    let mut doc = User::schema()
        .validate_create(input)
        .map_err(|e| ApiError::from(e).with_operation(ApiOperation::Create))?;
    let password = doc.get("password").and_then(Value::as_str).unwrap_or_default();
    let hash = state.passwords().hash(password)?;
    doc.insert("password".to_string(), Value::String(hash));

    let user = state.store().create(User::COLLECTION, doc).await?;
    tracing::info!(user = %user_id(&user), "user signed up");

    let identity = Identity::new(visible(user.clone()));
    let url = format!("{}/me", state.config().service.public_url.trim_end_matches('/'));
    let mail = Email::new(&identity, url, &state.config().email.from).welcome();
    if let Err(err) = state.mailer().send(mail).await {
        tracing::warn!(user = %identity.id(), error = %err, "welcome email failed");
    }

    send_token(&state, user, StatusCode::CREATED)
}

/// `POST /users/login`
pub async fn login<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (text(&payload, "email"), text(&payload, "password")) else {
        return Err(ApiError::bad_request("Please provide email and password!")
            .with_operation(ApiOperation::Authenticate));
    };

    let filter = Filter::new()
        .and(FilterCondition::eq("email", json!(email.trim().to_lowercase())))
        .merge(scope_filter(&User::read_decorations()));
    let user = state
        .store()
        .find_one(User::COLLECTION, &filter, &Projection::default())
        .await?;

    let authenticated = match &user {
        Some(user) => {
            let hash = user.get("password").and_then(Value::as_str).unwrap_or_default();
            state.passwords().verify(password, hash).unwrap_or(false)
        }
        None => false,
    };
    match user {
        Some(user) if authenticated => {
            tracing::info!(user = %user_id(&user), "user logged in");
            send_token(&state, user, StatusCode::OK)
        }
        _ => Err(ApiError::unauthorized("Incorrect email or password")
            .with_operation(ApiOperation::Authenticate)),
    }
}

/// `GET /users/logout`
pub async fn logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, TokenService::logout_cookie())],
        Json(json!({ "status": SUCCESS })),
    )
}

/// `POST /users/forgotPassword`
pub async fn forgot_password<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    let email = text(&payload, "email").unwrap_or_default().trim().to_lowercase();
    let decorations = User::read_decorations();
    let filter = Filter::new()
        .and(FilterCondition::eq("email", json!(email)))
        .merge(scope_filter(&decorations));
    let user = state
        .store()
        .find_one(User::COLLECTION, &filter, &scope_projection(&decorations))
        .await?
        .ok_or_else(|| {
            ApiError::new(
                ApiOperation::Authenticate,
                ApiErrorKind::NotFound,
                "There is no user with email address.",
            )
        })?;
    let id = user_id(&user).to_string();

    let reset_token = hex::encode(rand::random::<[u8; 32]>());
    let expires = Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES);
    let update = Update::new()
        .set("passwordResetToken", Value::String(reset_token_hash(&reset_token)))
        .set("passwordResetExpires", Value::String(format_date(expires)));
    state
        .store()
        .update_by_id(User::COLLECTION, &id, &Filter::new(), &update)
        .await?;

    let url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config().service.public_url.trim_end_matches('/'),
        reset_token
    );
    let mail = Email::new(&Identity::new(user), url, &state.config().email.from).password_reset();

    if let Err(err) = state.mailer().send(mail).await {
        let rollback = Update::new()
            .unset("passwordResetToken")
            .unset("passwordResetExpires");
        state
            .store()
            .update_by_id(User::COLLECTION, &id, &Filter::new(), &rollback)
            .await?;
        return Err(Error::from(err).into());
    }

    tracing::info!(user = %id, "password reset token sent");
    Ok(Json(MessageBody {
        status: SUCCESS,
        message: "Token sent to email!",
    })
    .into_response())
}

/// `PATCH /users/resetPassword/{token}`
pub async fn reset_password<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(token): Path<String>,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    let filter = Filter::new()
        .and(FilterCondition::eq("passwordResetToken", json!(reset_token_hash(&token))))
        .and(FilterCondition::gt("passwordResetExpires", json!(format_date(Utc::now()))))
        .merge(scope_filter(&User::read_decorations()));
    let user = state
        .store()
        .find_one(User::COLLECTION, &filter, &Projection::default())
        .await?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    let hash = new_password_hash(&state, &payload)?;
    let updated = state
        .store()
        .update_by_id(User::COLLECTION, user_id(&user), &Filter::new(), &password_change(hash))
        .await?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    tracing::info!(user = %user_id(&updated), "password reset");
    send_token(&state, updated, StatusCode::OK)
}

/// `PATCH /users/updateMyPassword`
pub async fn update_my_password<S: DocumentStore>(
    State(state): State<AppState<S>>,
    context: RequestContext,
    Payload(payload): Payload,
) -> Result<Response, ApiError> {
    let identity = context
        .identity
        .ok_or_else(|| ApiError::unauthorized(super::NOT_LOGGED_IN))?;

    let user = state
        .store()
        .find_by_id(User::COLLECTION, identity.id(), &Filter::new(), &Projection::default())
        .await?
        .ok_or_else(|| ApiError::not_found(User::NAME, identity.id()))?;

    let current = text(&payload, "passwordCurrent").unwrap_or_default();
    let hash = user.get("password").and_then(Value::as_str).unwrap_or_default();
    if !state.passwords().verify(current, hash).unwrap_or(false) {
        return Err(ApiError::unauthorized("Your current password is wrong.")
            .with_operation(ApiOperation::Authenticate));
    }

    let new_hash = new_password_hash(&state, &payload)?;
    let updated = state
        .store()
        .update_by_id(User::COLLECTION, identity.id(), &Filter::new(), &password_change(new_hash))
        .await?
        .ok_or_else(|| ApiError::not_found(User::NAME, identity.id()))?;

    tracing::info!(user = %identity.id(), "password updated");
    send_token(&state, updated, StatusCode::OK)
}
