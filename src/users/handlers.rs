use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    pagination::Pagination,
    state::AppState,
    users::{
        dto::{UpdateUserRequest, UserItem, UserList},
        services,
    },
};

/// Every user route requires a bearer token.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users",
            get(list_users).put(update_profile).delete(delete_account),
        )
        .route("/users/profile", get(profile))
        .route("/users/:id", get(get_user))
}

#[instrument(skip(state, _user))]
pub async fn list_users(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(pagination): AppQuery<Pagination>,
) -> Result<Json<UserList>, AppError> {
    let users = services::list_users(&state, pagination).await?;
    Ok(Json(UserList {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(user))]
pub async fn profile(AuthUser(user): AuthUser) -> Json<UserItem> {
    Json(UserItem { user: user.into() })
}

#[instrument(skip(state, _user))]
pub async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<UserItem>, AppError> {
    let user = services::get_user(&state, id).await?;
    Ok(Json(UserItem { user: user.into() }))
}

#[instrument(skip(state, user, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserItem>, AppError> {
    let updated = services::update_profile(&state, &user, payload.user).await?;
    Ok(Json(UserItem {
        user: updated.into(),
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_account(&state, &user).await?;
    Ok(Json(MessageResponse::new("Account deleted")))
}
