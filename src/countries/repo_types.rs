use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Reference data; seeded by migration, read-only to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Country {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub flag_emoji: Option<String>,
    pub area: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct CountryCountRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub flag_emoji: Option<String>,
    pub area: Option<String>,
    pub tip_count: i64,
    pub last_post_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RecentTipRow {
    pub country_id: i64,
    pub id: Uuid,
    pub title: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentTip {
    pub id: Uuid,
    pub title: String,
    pub category: String,
}

/// Per-country aggregate for the landing page.
#[derive(Debug, Clone, Serialize)]
pub struct CountryStats {
    #[serde(flatten)]
    pub country: Country,
    pub tip_count: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_post_date: Option<OffsetDateTime>,
    pub recent_tips: Vec<RecentTip>,
}
