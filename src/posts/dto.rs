use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{extract::empty_string_as_none, pagination::Pagination};

use super::repo_types::{CommentRow, LikeOutcome, PostRow};

/// `GET /posts` query string. Blank parameters count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct PostQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub country_id: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub per_page: Option<i64>,
}

impl PostQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Body of create and update: `{ "post": { ... } }`.
#[derive(Debug, Deserialize)]
pub struct PostRequest {
    #[serde(default)]
    pub post: PostInput,
}

/// Raw client input; the country may be given by code or by id.
#[derive(Debug, Default, Deserialize)]
pub struct PostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub country_code: Option<String>,
    pub country_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountryRef {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub flag_emoji: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub likes_count: i32,
    pub country: CountryRef,
    pub user: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<PostRow> for PostResponse {
    fn from(r: PostRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            content: r.content,
            category: r.category,
            likes_count: r.likes_count,
            country: CountryRef {
                id: r.country_id,
                code: r.country_code,
                name: r.country_name,
                flag_emoji: r.country_flag_emoji,
            },
            user: Author {
                id: r.user_id,
                name: r.user_name,
                avatar_url: r.user_avatar_url,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostList {
    pub posts: Vec<PostResponse>,
}

#[derive(Debug, Serialize)]
pub struct PostItem {
    pub post: PostResponse,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub user: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentResponse {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id,
            post_id: r.post_id,
            content: r.content,
            user: Author {
                id: r.user_id,
                name: r.user_name,
                avatar_url: r.user_avatar_url,
            },
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentList {
    pub comments: Vec<CommentResponse>,
}

#[derive(Debug, Serialize)]
pub struct CommentItem {
    pub comment: CommentResponse,
}

pub type LikeResponse = LikeOutcome;
