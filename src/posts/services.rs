use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    countries::{repo::CountryStore, repo_types::Country},
    error::AppError,
    pagination::Pagination,
    posts::{
        dto::{PostInput, PostQuery},
        repo::PostStore,
        repo_types::{Category, CommentRow, LikeOutcome, NewPost, PostChanges, PostFilter, PostRow},
    },
    state::AppState,
};

pub(crate) const TITLE_MAX_LEN: usize = 100;
pub(crate) const CONTENT_MAX_LEN: usize = 10_000;
pub(crate) const COMMENT_MAX_LEN: usize = 1_000;

fn length_errors(field: &str, value: &str, max: usize) -> Vec<String> {
    let len = value.chars().count();
    if len == 0 {
        vec![format!("{field} can't be blank")]
    } else if len > max {
        vec![format!("{field} is too long (maximum is {max} characters)")]
    } else {
        Vec::new()
    }
}

fn parse_category(raw: &str, errors: &mut Vec<String>) -> Option<Category> {
    if raw.trim().is_empty() {
        errors.push("Category can't be blank".into());
        return None;
    }
    match raw.parse::<Category>() {
        Ok(c) => Some(c),
        Err(_) => {
            errors.push("Category is not included in the list".into());
            None
        }
    }
}

/// Resolves a country reference given by id or code; id wins when both are set.
async fn resolve_country(
    state: &AppState,
    id: Option<i64>,
    code: Option<&str>,
) -> Result<Option<Country>, AppError> {
    if let Some(id) = id {
        return Ok(state.store.find_country_by_id(id).await?);
    }
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Ok(state.store.find_country_by_code(code).await?),
        None => Ok(None),
    }
}

/// Filtered, newest-first listing. Blank filters are ignored; an unknown
/// country or category matches nothing rather than failing.
pub async fn list_posts(state: &AppState, query: PostQuery) -> Result<Vec<PostRow>, AppError> {
    let pagination: Pagination = query.pagination();
    let country_code = query
        .country_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let country_id = if query.country_id.is_some() || country_code.is_some() {
        match resolve_country(state, query.country_id, country_code).await? {
            Some(c) => Some(c.id),
            None => return Ok(Vec::new()),
        }
    } else {
        None
    };

    let category = match query.category.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => match raw.parse::<Category>() {
            Ok(c) => Some(c),
            Err(_) => return Ok(Vec::new()),
        },
    };

    let filter = PostFilter {
        country_id,
        category,
        user_id: query.user_id,
    };
    Ok(state.store.list_posts(filter, pagination.window()).await?)
}

pub async fn get_post(state: &AppState, id: Uuid) -> Result<PostRow, AppError> {
    state
        .store
        .find_post(id)
        .await?
        .ok_or(AppError::NotFound("Post"))
}

pub async fn create_post(
    state: &AppState,
    owner: &User,
    input: PostInput,
) -> Result<PostRow, AppError> {
    let mut errors = Vec::new();

    let title = input.title.unwrap_or_default().trim().to_string();
    errors.extend(length_errors("Title", &title, TITLE_MAX_LEN));
    let content = input.content.unwrap_or_default().trim().to_string();
    errors.extend(length_errors("Content", &content, CONTENT_MAX_LEN));
    let category = parse_category(input.category.as_deref().unwrap_or(""), &mut errors);
    let country = resolve_country(state, input.country_id, input.country_code.as_deref()).await?;
    if country.is_none() {
        errors.push("Country must exist".into());
    }

    let (Some(category), Some(country), true) = (category, country, errors.is_empty()) else {
        debug!(count = errors.len(), "post rejected");
        return Err(AppError::Validation(errors));
    };

    let post = state
        .store
        .create_post(
            owner.id,
            NewPost {
                country_id: country.id,
                title,
                content,
                category,
            },
        )
        .await?;
    info!(post_id = %post.id, user_id = %owner.id, country = %post.country_code, "post created");
    Ok(post)
}

/// Owner-only. A post owned by someone else is reported as missing.
pub async fn update_post(
    state: &AppState,
    owner: &User,
    id: Uuid,
    input: PostInput,
) -> Result<PostRow, AppError> {
    match state.store.find_post(id).await? {
        Some(post) if post.user_id == owner.id => {}
        _ => return Err(AppError::NotFound("Post")),
    }

    let mut errors = Vec::new();
    let mut changes = PostChanges::default();

    if let Some(title) = input.title {
        let title = title.trim().to_string();
        errors.extend(length_errors("Title", &title, TITLE_MAX_LEN));
        changes.title = Some(title);
    }
    if let Some(content) = input.content {
        let content = content.trim().to_string();
        errors.extend(length_errors("Content", &content, CONTENT_MAX_LEN));
        changes.content = Some(content);
    }
    if let Some(raw) = input.category.as_deref() {
        changes.category = parse_category(raw, &mut errors);
    }
    if input.country_id.is_some() || input.country_code.is_some() {
        match resolve_country(state, input.country_id, input.country_code.as_deref()).await? {
            Some(c) => changes.country_id = Some(c.id),
            None => errors.push("Country must exist".into()),
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let post = state
        .store
        .update_post(id, owner.id, changes)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    info!(post_id = %post.id, user_id = %owner.id, "post updated");
    Ok(post)
}

pub async fn delete_post(state: &AppState, owner: &User, id: Uuid) -> Result<(), AppError> {
    if !state.store.delete_post(id, owner.id).await? {
        return Err(AppError::NotFound("Post"));
    }
    info!(post_id = %id, user_id = %owner.id, "post deleted");
    Ok(())
}

pub async fn toggle_like(state: &AppState, user: &User, id: Uuid) -> Result<LikeOutcome, AppError> {
    let outcome = state
        .store
        .toggle_like(id, user.id)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    debug!(post_id = %id, user_id = %user.id, liked = outcome.liked, "like toggled");
    Ok(outcome)
}

pub async fn list_comments(state: &AppState, post_id: Uuid) -> Result<Vec<CommentRow>, AppError> {
    get_post(state, post_id).await?;
    Ok(state.store.list_comments(post_id).await?)
}

pub async fn create_comment(
    state: &AppState,
    author: &User,
    post_id: Uuid,
    content: &str,
) -> Result<CommentRow, AppError> {
    let content = content.trim();
    let errors = length_errors("Content", content, COMMENT_MAX_LEN);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let comment = state
        .store
        .create_comment(post_id, author.id, content)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    info!(comment_id = %comment.id, post_id = %post_id, "comment created");
    Ok(comment)
}

pub async fn delete_comment(
    state: &AppState,
    author: &User,
    post_id: Uuid,
    comment_id: Uuid,
) -> Result<(), AppError> {
    if !state
        .store
        .delete_comment(post_id, comment_id, author.id)
        .await?
    {
        return Err(AppError::NotFound("Comment"));
    }
    Ok(())
}
