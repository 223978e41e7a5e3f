use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::{PgStore, StoreResult},
    pagination::Window,
    posts::repo_types::{
        CommentRow, LikeOutcome, NewPost, PostChanges, PostFilter, PostRow,
    },
};

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Newest first.
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: Option<Window>,
    ) -> StoreResult<Vec<PostRow>>;

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<PostRow>>;

    async fn create_post(&self, owner: Uuid, new: NewPost) -> StoreResult<PostRow>;

    /// `None` when the post does not exist or is not owned by `owner`.
    async fn update_post(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: PostChanges,
    ) -> StoreResult<Option<PostRow>>;

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> StoreResult<bool>;

    /// Likes or unlikes and returns the recomputed count. `None` if the post is gone.
    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<LikeOutcome>>;

    /// Oldest first.
    async fn list_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentRow>>;

    /// `None` if the post does not exist.
    async fn create_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<CommentRow>>;

    async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<bool>;
}

/// Post columns joined with author and country; `source` is aliased as `p`.
fn post_select(source: &str) -> String {
    format!(
        r#"
        SELECT p.id, p.title, p.content, p.category, p.likes_count,
               p.created_at, p.updated_at,
               u.id AS user_id, u.name AS user_name, u.avatar_url AS user_avatar_url,
               c.id AS country_id, c.code AS country_code, c.name AS country_name,
               c.flag_emoji AS country_flag_emoji
        FROM {source} p
        JOIN users u ON u.id = p.user_id
        JOIN countries c ON c.id = p.country_id
        "#
    )
}

fn comment_select(source: &str) -> String {
    format!(
        r#"
        SELECT cm.id, cm.post_id, cm.content, cm.created_at, cm.updated_at,
               u.id AS user_id, u.name AS user_name, u.avatar_url AS user_avatar_url
        FROM {source} cm
        JOIN users u ON u.id = cm.user_id
        "#
    )
}

#[async_trait]
impl PostStore for PgStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: Option<Window>,
    ) -> StoreResult<Vec<PostRow>> {
        let sql = format!(
            r#"
            {}
            WHERE ($1::BIGINT IS NULL OR p.country_id = $1)
              AND ($2::TEXT IS NULL OR p.category = $2)
              AND ($3::UUID IS NULL OR p.user_id = $3)
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $4 OFFSET $5
            "#,
            post_select("posts")
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(filter.country_id)
            .bind(filter.category.map(|c| c.as_str()))
            .bind(filter.user_id)
            .bind(window.map(|w| w.limit))
            .bind(window.map(|w| w.offset))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<PostRow>> {
        let sql = format!("{} WHERE p.id = $1", post_select("posts"));
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn create_post(&self, owner: Uuid, new: NewPost) -> StoreResult<PostRow> {
        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO posts (user_id, country_id, title, content, category)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            {}
            "#,
            post_select("inserted")
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(owner)
            .bind(new.country_id)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.category.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn update_post(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: PostChanges,
    ) -> StoreResult<Option<PostRow>> {
        let sql = format!(
            r#"
            WITH updated AS (
                UPDATE posts SET
                    country_id = COALESCE($3, country_id),
                    title = COALESCE($4, title),
                    content = COALESCE($5, content),
                    category = COALESCE($6, category),
                    updated_at = now()
                WHERE id = $1 AND user_id = $2
                RETURNING *
            )
            {}
            "#,
            post_select("updated")
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .bind(owner)
            .bind(changes.country_id)
            .bind(&changes.title)
            .bind(&changes.content)
            .bind(changes.category.map(|c| c.as_str()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<LikeOutcome>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent toggles on the same post.
        let exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;
        if !removed {
            sqlx::query("INSERT INTO likes (post_id, user_id) VALUES ($1, $2)")
                .bind(post_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let (likes_count,): (i32,) = sqlx::query_as(
            r#"
            UPDATE posts
            SET likes_count = (SELECT COUNT(*) FROM likes WHERE post_id = $1)
            WHERE id = $1
            RETURNING likes_count
            "#,
        )
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(LikeOutcome {
            liked: !removed,
            likes_count,
        }))
    }

    async fn list_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentRow>> {
        let sql = format!(
            "{} WHERE cm.post_id = $1 ORDER BY cm.created_at ASC, cm.id ASC",
            comment_select("comments")
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<CommentRow>> {
        let sql = format!(
            r#"
            WITH inserted AS (
                INSERT INTO comments (post_id, user_id, content)
                SELECT $1, $2, $3
                WHERE EXISTS (SELECT 1 FROM posts WHERE id = $1)
                RETURNING *
            )
            {}
            "#,
            comment_select("inserted")
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .bind(user_id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1 AND post_id = $2 AND user_id = $3")
            .bind(comment_id)
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
