use axum::{
    extract::State,
    http::{header::LOCATION, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::{dto::MessageResponse, extractors::AuthUser},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    posts::{
        dto::{
            CommentItem, CommentList, CommentRequest, LikeResponse, PostItem, PostList, PostQuery,
            PostRequest,
        },
        services,
    },
    state::AppState,
};

/// Reads are public; every handler that writes takes `AuthUser`.
pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/:id/like", post(toggle_like))
        .route(
            "/posts/:id/comments",
            get(list_comments).post(create_comment),
        )
        .route("/posts/:id/comments/:comment_id", delete(delete_comment))
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<PostQuery>,
) -> Result<Json<PostList>, AppError> {
    let rows = services::list_posts(&state, query).await?;
    Ok(Json(PostList {
        posts: rows.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PostItem>, AppError> {
    let row = services::get_post(&state, id).await?;
    Ok(Json(PostItem { post: row.into() }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<PostRequest>,
) -> Result<impl IntoResponse, AppError> {
    let row = services::create_post(&state, &user, payload.post).await?;
    let location = format!("/api/v1/posts/{}", row.id);
    Ok((
        StatusCode::CREATED,
        [(LOCATION, location)],
        Json(PostItem { post: row.into() }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<PostRequest>,
) -> Result<Json<PostItem>, AppError> {
    let row = services::update_post(&state, &user, id, payload.post).await?;
    Ok(Json(PostItem { post: row.into() }))
}

#[instrument(skip(state, user))]
pub async fn delete_post(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_post(&state, &user, id).await?;
    Ok(Json(MessageResponse::new("Post deleted")))
}

#[instrument(skip(state, user))]
pub async fn toggle_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    Ok(Json(services::toggle_like(&state, &user, id).await?))
}

#[instrument(skip(state))]
pub async fn list_comments(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<CommentList>, AppError> {
    let rows = services::list_comments(&state, id).await?;
    Ok(Json(CommentList {
        comments: rows.into_iter().map(Into::into).collect(),
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentItem>), AppError> {
    let row = services::create_comment(&state, &user, id, &payload.content).await?;
    Ok((StatusCode::CREATED, Json(CommentItem { comment: row.into() })))
}

#[instrument(skip(state, user))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath((id, comment_id)): AppPath<(Uuid, Uuid)>,
) -> Result<Json<MessageResponse>, AppError> {
    services::delete_comment(&state, &user, id, comment_id).await?;
    Ok(Json(MessageResponse::new("Comment deleted")))
}
