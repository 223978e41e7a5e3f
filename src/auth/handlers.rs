use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse,
            ResetPasswordRequest, SignupRequest,
        },
        services,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub(crate) const RESET_REQUESTED_MESSAGE: &str =
    "If that email address is registered, password reset instructions have been sent";

/// All public: none of these take `AuthUser`.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/password/forgot", post(forgot_password))
        .route("/auth/password/reset", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(services::login(&state, payload).await?))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let res = services::signup(&state, payload.user).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::request_reset(&state, &payload.email, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::complete_reset(&state, payload, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::new("Password has been reset")))
}
