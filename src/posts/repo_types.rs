use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Fixed label set for tips. Stored as its snake_case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Transport,
    Lodging,
    Food,
    Sim,
    Visa,
    CurrencyExchange,
    Safety,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Transport,
        Category::Lodging,
        Category::Food,
        Category::Sim,
        Category::Visa,
        Category::CurrencyExchange,
        Category::Safety,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transport => "transport",
            Category::Lodging => "lodging",
            Category::Food => "food",
            Category::Sim => "sim",
            Category::Visa => "visa",
            Category::CurrencyExchange => "currency_exchange",
            Category::Safety => "safety",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCategory;

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or(UnknownCategory)
    }
}

/// Post joined with its author and country, as every read returns it.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    pub likes_count: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar_url: Option<String>,
    pub country_id: i64,
    pub country_code: String,
    pub country_name: String,
    pub country_flag_emoji: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub country_id: i64,
    pub title: String,
    pub content: String,
    pub category: Category,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub country_id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostFilter {
    pub country_id: Option<i64>,
    pub category: Option<Category>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub user_id: Uuid,
    pub user_name: String,
    pub user_avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeOutcome {
    pub liked: bool,
    pub likes_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_parse_back() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>(), Ok(c));
        }
        assert_eq!(" Food ".parse::<Category>(), Ok(Category::Food));
        assert_eq!("nightlife".parse::<Category>(), Err(UnknownCategory));
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&Category::CurrencyExchange).unwrap();
        assert_eq!(json, "\"currency_exchange\"");
    }
}
