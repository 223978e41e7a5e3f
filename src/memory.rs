use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

use anyhow::anyhow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{NewUser, Role, User, UserChanges},
    },
    countries::{
        repo::CountryStore,
        repo_types::{Country, CountryStats, RecentTip},
    },
    db::{StoreError, StoreResult},
    pagination::Window,
    posts::{
        repo::PostStore,
        repo_types::{
            Category, CommentRow, LikeOutcome, NewPost, PostChanges, PostFilter, PostRow,
        },
    },
};

#[derive(Debug, Clone)]
struct StoredPost {
    id: Uuid,
    user_id: Uuid,
    country_id: i64,
    title: String,
    content: String,
    category: Category,
    likes_count: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct StoredComment {
    id: Uuid,
    post_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    countries: Vec<Country>,
    posts: Vec<StoredPost>,
    likes: HashSet<(Uuid, Uuid)>,
    comments: Vec<StoredComment>,
}

impl Inner {
    fn post_row(&self, p: &StoredPost) -> Option<PostRow> {
        let user = self.users.iter().find(|u| u.id == p.user_id)?;
        let country = self.countries.iter().find(|c| c.id == p.country_id)?;
        Some(PostRow {
            id: p.id,
            title: p.title.clone(),
            content: p.content.clone(),
            category: p.category.as_str().to_string(),
            likes_count: p.likes_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
            user_id: user.id,
            user_name: user.name.clone(),
            user_avatar_url: user.avatar_url.clone(),
            country_id: country.id,
            country_code: country.code.clone(),
            country_name: country.name.clone(),
            country_flag_emoji: country.flag_emoji.clone(),
        })
    }

    fn comment_row(&self, c: &StoredComment) -> Option<CommentRow> {
        let user = self.users.iter().find(|u| u.id == c.user_id)?;
        Some(CommentRow {
            id: c.id,
            post_id: c.post_id,
            content: c.content.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            user_id: user.id,
            user_name: user.name.clone(),
            user_avatar_url: user.avatar_url.clone(),
        })
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    /// Posts newest first; later insertions win ties.
    fn posts_newest_first(&self) -> Vec<&StoredPost> {
        let mut posts: Vec<&StoredPost> = self.posts.iter().rev().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
    }

    fn remove_post(&mut self, id: Uuid) {
        self.posts.retain(|p| p.id != id);
        self.comments.retain(|c| c.post_id != id);
        self.likes.retain(|(post_id, _)| *post_id != id);
    }

    fn recount_likes(&mut self, post_id: Uuid) -> i32 {
        let count = self.likes.iter().filter(|(p, _)| *p == post_id).count() as i32;
        if let Some(post) = self.posts.iter_mut().find(|p| p.id == post_id) {
            post.likes_count = count;
        }
        count
    }
}

/// Process-local store with the same observable behaviour as `PgStore`.
/// Backs `AppState::fake()` and the integration tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Other(anyhow!("memory store lock poisoned")))
    }

    /// Seeds a reference country. Ids are assigned in insertion order.
    pub fn add_country(
        &self,
        code: &str,
        name: &str,
        flag_emoji: &str,
        area: &str,
    ) -> StoreResult<Country> {
        let mut inner = self.lock()?;
        if inner.countries.iter().any(|c| c.code.eq_ignore_ascii_case(code)) {
            return Err(StoreError::Conflict("code"));
        }
        let country = Country {
            id: inner.countries.len() as i64 + 1,
            code: code.to_uppercase(),
            name: name.to_string(),
            flag_emoji: Some(flag_emoji.to_string()),
            area: Some(area.to_string()),
        };
        inner.countries.push(country.clone());
        Ok(country)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_reset_token(&self, token: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.reset_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list_users(&self, window: Option<Window>) -> StoreResult<Vec<User>> {
        let mut users = self.lock()?.users.clone();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(match window {
            Some(w) => w.slice(users),
            None => users,
        })
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut inner = self.lock()?;
        if inner.email_taken(&new.email, None) {
            return Err(StoreError::Conflict("email"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            password_digest: new.password_digest,
            bio: new.bio,
            location: new.location,
            website: new.website,
            avatar_url: new.avatar_url,
            reset_token: None,
            reset_token_issued_at: None,
            role: Role::User,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<Option<User>> {
        let mut inner = self.lock()?;
        if let Some(email) = changes.email.as_deref() {
            if inner.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("email"));
            }
        }
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.name {
            user.name = v;
        }
        if let Some(v) = changes.password_digest {
            user.password_digest = v;
        }
        if let Some(v) = changes.bio {
            user.bio = Some(v);
        }
        if let Some(v) = changes.location {
            user.location = Some(v);
        }
        if let Some(v) = changes.website {
            user.website = Some(v);
        }
        if let Some(v) = changes.avatar_url {
            user.avatar_url = Some(v);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        if inner.users.len() == before {
            return Ok(false);
        }

        let owned: Vec<Uuid> = inner
            .posts
            .iter()
            .filter(|p| p.user_id == id)
            .map(|p| p.id)
            .collect();
        for post_id in owned {
            inner.remove_post(post_id);
        }
        inner.comments.retain(|c| c.user_id != id);

        let liked: Vec<Uuid> = inner
            .likes
            .iter()
            .filter(|(_, user_id)| *user_id == id)
            .map(|(post_id, _)| *post_id)
            .collect();
        inner.likes.retain(|(_, user_id)| *user_id != id);
        for post_id in liked {
            inner.recount_likes(post_id);
        }
        Ok(true)
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        if let Some(user) = self.lock()?.users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn store_reset_token(
        &self,
        id: Uuid,
        token: &str,
        issued_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if inner
            .users
            .iter()
            .any(|u| u.id != id && u.reset_token.as_deref() == Some(token))
        {
            return Err(StoreError::Conflict("reset_token"));
        }
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.reset_token = Some(token.to_string());
            user.reset_token_issued_at = Some(issued_at);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn complete_password_reset(
        &self,
        id: Uuid,
        token: &str,
        password_digest: &str,
    ) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let Some(user) = inner
            .users
            .iter_mut()
            .find(|u| u.id == id && u.reset_token.as_deref() == Some(token))
        else {
            return Ok(false);
        };
        user.password_digest = password_digest.to_string();
        user.reset_token = None;
        user.reset_token_issued_at = None;
        user.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }
}

#[async_trait]
impl CountryStore for MemoryStore {
    async fn list_countries(&self) -> StoreResult<Vec<Country>> {
        let mut countries = self.lock()?.countries.clone();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    async fn find_country_by_code(&self, code: &str) -> StoreResult<Option<Country>> {
        let code = code.trim();
        Ok(self
            .lock()?
            .countries
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_country_by_id(&self, id: i64) -> StoreResult<Option<Country>> {
        Ok(self.lock()?.countries.iter().find(|c| c.id == id).cloned())
    }

    async fn country_stats(&self, recent_per_country: i64) -> StoreResult<Vec<CountryStats>> {
        let inner = self.lock()?;
        let posts = inner.posts_newest_first();
        let mut stats: Vec<CountryStats> = inner
            .countries
            .iter()
            .map(|country| {
                let in_country: Vec<&&StoredPost> =
                    posts.iter().filter(|p| p.country_id == country.id).collect();
                CountryStats {
                    country: country.clone(),
                    tip_count: in_country.len() as i64,
                    last_post_date: in_country.first().map(|p| p.created_at),
                    recent_tips: in_country
                        .iter()
                        .take(recent_per_country.max(0) as usize)
                        .map(|p| RecentTip {
                            id: p.id,
                            title: p.title.clone(),
                            category: p.category.as_str().to_string(),
                        })
                        .collect(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.country.name.cmp(&b.country.name));
        Ok(stats)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn list_posts(
        &self,
        filter: PostFilter,
        window: Option<Window>,
    ) -> StoreResult<Vec<PostRow>> {
        let inner = self.lock()?;
        let rows: Vec<PostRow> = inner
            .posts_newest_first()
            .into_iter()
            .filter(|p| filter.country_id.map_or(true, |id| p.country_id == id))
            .filter(|p| filter.category.map_or(true, |c| p.category == c))
            .filter(|p| filter.user_id.map_or(true, |id| p.user_id == id))
            .filter_map(|p| inner.post_row(p))
            .collect();
        Ok(match window {
            Some(w) => w.slice(rows),
            None => rows,
        })
    }

    async fn find_post(&self, id: Uuid) -> StoreResult<Option<PostRow>> {
        let inner = self.lock()?;
        Ok(inner
            .posts
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| inner.post_row(p)))
    }

    async fn create_post(&self, owner: Uuid, new: NewPost) -> StoreResult<PostRow> {
        let mut inner = self.lock()?;
        if !inner.countries.iter().any(|c| c.id == new.country_id) {
            return Err(StoreError::Other(anyhow!("country {} does not exist", new.country_id)));
        }
        let now = OffsetDateTime::now_utc();
        let post = StoredPost {
            id: Uuid::new_v4(),
            user_id: owner,
            country_id: new.country_id,
            title: new.title,
            content: new.content,
            category: new.category,
            likes_count: 0,
            created_at: now,
            updated_at: now,
        };
        let row = inner
            .post_row(&post)
            .ok_or_else(|| StoreError::Other(anyhow!("user {owner} does not exist")))?;
        inner.posts.push(post);
        Ok(row)
    }

    async fn update_post(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: PostChanges,
    ) -> StoreResult<Option<PostRow>> {
        let mut inner = self.lock()?;
        let Some(post) = inner
            .posts
            .iter_mut()
            .find(|p| p.id == id && p.user_id == owner)
        else {
            return Ok(None);
        };
        if let Some(v) = changes.country_id {
            post.country_id = v;
        }
        if let Some(v) = changes.title {
            post.title = v;
        }
        if let Some(v) = changes.content {
            post.content = v;
        }
        if let Some(v) = changes.category {
            post.category = v;
        }
        post.updated_at = OffsetDateTime::now_utc();
        let post = post.clone();
        Ok(inner.post_row(&post))
    }

    async fn delete_post(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if !inner.posts.iter().any(|p| p.id == id && p.user_id == owner) {
            return Ok(false);
        }
        inner.remove_post(id);
        Ok(true)
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> StoreResult<Option<LikeOutcome>> {
        let mut inner = self.lock()?;
        if !inner.posts.iter().any(|p| p.id == post_id) {
            return Ok(None);
        }
        let liked = if inner.likes.remove(&(post_id, user_id)) {
            false
        } else {
            inner.likes.insert((post_id, user_id));
            true
        };
        let likes_count = inner.recount_likes(post_id);
        Ok(Some(LikeOutcome { liked, likes_count }))
    }

    async fn list_comments(&self, post_id: Uuid) -> StoreResult<Vec<CommentRow>> {
        let inner = self.lock()?;
        let mut comments: Vec<&StoredComment> =
            inner.comments.iter().filter(|c| c.post_id == post_id).collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(comments
            .into_iter()
            .filter_map(|c| inner.comment_row(c))
            .collect())
    }

    async fn create_comment(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StoreResult<Option<CommentRow>> {
        let mut inner = self.lock()?;
        if !inner.posts.iter().any(|p| p.id == post_id) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let comment = StoredComment {
            id: Uuid::new_v4(),
            post_id,
            user_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        let row = inner.comment_row(&comment);
        inner.comments.push(comment);
        Ok(row)
    }

    async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.comments.len();
        inner
            .comments
            .retain(|c| !(c.id == comment_id && c.post_id == post_id && c.user_id == user_id));
        Ok(inner.comments.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: "Kenji".into(),
            password_digest: "digest".into(),
            bio: None,
            location: None,
            website: None,
            avatar_url: None,
        }
    }

    fn new_post(country_id: i64, title: &str, category: Category) -> NewPost {
        NewPost {
            country_id,
            title: title.into(),
            content: "body".into(),
            category,
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.com")).await.unwrap();
        let err = store.create_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict("email")));
        // exact match only
        assert!(store.create_user(new_user("A@x.com")).await.is_ok());
    }

    #[tokio::test]
    async fn posts_list_newest_first_and_filter() {
        let store = MemoryStore::new();
        let jp = store.add_country("JP", "Japan", "🇯🇵", "East Asia").unwrap();
        let fr = store.add_country("FR", "France", "🇫🇷", "Europe").unwrap();
        let user = store.create_user(new_user("a@x.com")).await.unwrap();

        store.create_post(user.id, new_post(jp.id, "first", Category::Food)).await.unwrap();
        store.create_post(user.id, new_post(fr.id, "second", Category::Visa)).await.unwrap();
        store.create_post(user.id, new_post(jp.id, "third", Category::Transport)).await.unwrap();

        let all = store.list_posts(PostFilter::default(), None).await.unwrap();
        let titles: Vec<&str> = all.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);

        let japan = PostFilter {
            country_id: Some(jp.id),
            ..Default::default()
        };
        assert_eq!(store.list_posts(japan, None).await.unwrap().len(), 2);

        let food_in_japan = PostFilter {
            country_id: Some(jp.id),
            category: Some(Category::Food),
            user_id: None,
        };
        let rows = store.list_posts(food_in_japan, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].country_code, "JP");
    }

    #[tokio::test]
    async fn like_toggles_and_recounts() {
        let store = MemoryStore::new();
        let jp = store.add_country("JP", "Japan", "🇯🇵", "East Asia").unwrap();
        let a = store.create_user(new_user("a@x.com")).await.unwrap();
        let b = store.create_user(new_user("b@x.com")).await.unwrap();
        let post = store.create_post(a.id, new_post(jp.id, "t", Category::Sim)).await.unwrap();

        let first = store.toggle_like(post.id, b.id).await.unwrap().unwrap();
        assert_eq!(first, LikeOutcome { liked: true, likes_count: 1 });
        let second = store.toggle_like(post.id, b.id).await.unwrap().unwrap();
        assert_eq!(second, LikeOutcome { liked: false, likes_count: 0 });
        assert!(store.toggle_like(Uuid::new_v4(), b.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_content() {
        let store = MemoryStore::new();
        let jp = store.add_country("JP", "Japan", "🇯🇵", "East Asia").unwrap();
        let a = store.create_user(new_user("a@x.com")).await.unwrap();
        let b = store.create_user(new_user("b@x.com")).await.unwrap();
        let a_post = store.create_post(a.id, new_post(jp.id, "a", Category::Food)).await.unwrap();
        let b_post = store.create_post(b.id, new_post(jp.id, "b", Category::Food)).await.unwrap();
        store.toggle_like(b_post.id, a.id).await.unwrap();
        store.create_comment(b_post.id, a.id, "nice").await.unwrap();

        assert!(store.delete_user(a.id).await.unwrap());
        assert!(store.find_post(a_post.id).await.unwrap().is_none());
        let b_post = store.find_post(b_post.id).await.unwrap().unwrap();
        assert_eq!(b_post.likes_count, 0);
        assert!(store.list_comments(b_post.id).await.unwrap().is_empty());
        assert!(!store.delete_user(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn reset_completion_requires_current_token() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@x.com")).await.unwrap();
        store
            .store_reset_token(user.id, "tok", OffsetDateTime::now_utc())
            .await
            .unwrap();

        assert!(!store.complete_password_reset(user.id, "other", "d2").await.unwrap());
        assert!(store.complete_password_reset(user.id, "tok", "d2").await.unwrap());
        assert!(!store.complete_password_reset(user.id, "tok", "d3").await.unwrap());

        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.password_digest, "d2");
        assert!(user.reset_token.is_none());
        assert!(user.reset_token_issued_at.is_none());
    }

    #[tokio::test]
    async fn stats_cover_every_country() {
        let store = MemoryStore::new();
        let jp = store.add_country("JP", "Japan", "🇯🇵", "East Asia").unwrap();
        store.add_country("FR", "France", "🇫🇷", "Europe").unwrap();
        let user = store.create_user(new_user("a@x.com")).await.unwrap();
        for title in ["one", "two", "three", "four"] {
            store.create_post(user.id, new_post(jp.id, title, Category::Food)).await.unwrap();
        }

        let stats = store.country_stats(3).await.unwrap();
        assert_eq!(stats[0].country.code, "FR");
        assert_eq!(stats[0].tip_count, 0);
        assert!(stats[0].last_post_date.is_none());
        assert_eq!(stats[1].tip_count, 4);
        let recent: Vec<&str> = stats[1].recent_tips.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(recent, vec!["four", "three", "two"]);
    }
}
