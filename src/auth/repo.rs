use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::repo_types::{NewUser, User, UserChanges},
    db::{PgStore, StoreResult},
    pagination::Window,
};

const USER_COLUMNS: &str = r#"
    id, email, name, password_digest, bio, location, website, avatar_url,
    reset_token, reset_token_issued_at, role_id AS role, last_login_at,
    created_at, updated_at
"#;

/// Credential store: user records keyed by id, email and reset token.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Exact, case-sensitive match.
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_reset_token(&self, token: &str) -> StoreResult<Option<User>>;

    /// Oldest account first.
    async fn list_users(&self, window: Option<Window>) -> StoreResult<Vec<User>>;

    /// Fails with `StoreError::Conflict("email")` when the address is taken.
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>>;

    /// Removes the user together with their posts, comments and likes.
    async fn delete_user(&self, id: Uuid) -> StoreResult<bool>;

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;

    async fn store_reset_token(
        &self,
        id: Uuid,
        token: &str,
        issued_at: OffsetDateTime,
    ) -> StoreResult<()>;

    /// Sets the new password and clears the reset token in one write, only if
    /// `token` is still the user's current reset token. Returns whether it applied.
    async fn complete_password_reset(
        &self,
        id: Uuid,
        token: &str,
        password_digest: &str,
    ) -> StoreResult<bool>;
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_reset_token(&self, token: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, window: Option<Window>) -> StoreResult<Vec<User>> {
        // LIMIT NULL / OFFSET NULL mean "no limit" / "no offset".
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(window.map(|w| w.limit))
        .bind(window.map(|w| w.offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_digest, bio, location, website, avatar_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.name)
        .bind(&new.password_digest)
        .bind(&new.bio)
        .bind(&new.location)
        .bind(&new.website)
        .bind(&new.avatar_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                email = COALESCE($2, email),
                name = COALESCE($3, name),
                password_digest = COALESCE($4, password_digest),
                bio = COALESCE($5, bio),
                location = COALESCE($6, location),
                website = COALESCE($7, website),
                avatar_url = COALESCE($8, avatar_url),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.email)
        .bind(&changes.name)
        .bind(&changes.password_digest)
        .bind(&changes.bio)
        .bind(&changes.location)
        .bind(&changes.website)
        .bind(&changes.avatar_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        // posts, comments and likes go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_reset_token(
        &self,
        id: Uuid,
        token: &str,
        issued_at: OffsetDateTime,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $2, reset_token_issued_at = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(issued_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token: &str,
        password_digest: &str,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET password_digest = $3,
                reset_token = NULL,
                reset_token_issued_at = NULL,
                updated_at = now()
            WHERE id = $1 AND reset_token = $2
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(password_digest)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}
