use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    countries::repo_types::{Country, CountryCountRow, CountryStats, RecentTip, RecentTipRow},
    db::{PgStore, StoreResult},
};

/// Recent tips listed per country in the stats view.
pub const RECENT_TIPS_PER_COUNTRY: i64 = 3;

#[async_trait]
pub trait CountryStore: Send + Sync {
    /// Ordered by name.
    async fn list_countries(&self) -> StoreResult<Vec<Country>>;

    /// Codes are matched case-insensitively.
    async fn find_country_by_code(&self, code: &str) -> StoreResult<Option<Country>>;

    async fn find_country_by_id(&self, id: i64) -> StoreResult<Option<Country>>;

    /// Every country, including those without posts, ordered by name.
    async fn country_stats(&self, recent_per_country: i64) -> StoreResult<Vec<CountryStats>>;
}

const COUNTRY_SELECT: &str = r#"
    SELECT c.id, c.code, c.name, c.flag_emoji, a.name AS area
    FROM countries c
    LEFT JOIN areas a ON a.id = c.area_id
"#;

#[async_trait]
impl CountryStore for PgStore {
    async fn list_countries(&self) -> StoreResult<Vec<Country>> {
        let rows = sqlx::query_as::<_, Country>(&format!("{COUNTRY_SELECT} ORDER BY c.name"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_country_by_code(&self, code: &str) -> StoreResult<Option<Country>> {
        let row = sqlx::query_as::<_, Country>(&format!(
            "{COUNTRY_SELECT} WHERE c.code = upper($1)"
        ))
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_country_by_id(&self, id: i64) -> StoreResult<Option<Country>> {
        let row = sqlx::query_as::<_, Country>(&format!("{COUNTRY_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn country_stats(&self, recent_per_country: i64) -> StoreResult<Vec<CountryStats>> {
        let counts = sqlx::query_as::<_, CountryCountRow>(
            r#"
            SELECT c.id, c.code, c.name, c.flag_emoji, a.name AS area,
                   COUNT(p.id) AS tip_count,
                   MAX(p.created_at) AS last_post_date
            FROM countries c
            LEFT JOIN areas a ON a.id = c.area_id
            LEFT JOIN posts p ON p.country_id = c.id
            GROUP BY c.id, a.name
            ORDER BY c.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let recent = sqlx::query_as::<_, RecentTipRow>(
            r#"
            SELECT country_id, id, title, category
            FROM (
                SELECT p.country_id, p.id, p.title, p.category,
                       ROW_NUMBER() OVER (
                           PARTITION BY p.country_id
                           ORDER BY p.created_at DESC, p.id DESC
                       ) AS rn
                FROM posts p
            ) ranked
            WHERE rn <= $1
            ORDER BY country_id, rn
            "#,
        )
        .bind(recent_per_country)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemble_stats(counts, recent))
    }
}

/// Joins per-country counts with their (already ordered) recent tips.
pub(crate) fn assemble_stats(
    counts: Vec<CountryCountRow>,
    recent: Vec<RecentTipRow>,
) -> Vec<CountryStats> {
    let mut by_country: HashMap<i64, Vec<RecentTip>> = HashMap::new();
    for row in recent {
        by_country.entry(row.country_id).or_default().push(RecentTip {
            id: row.id,
            title: row.title,
            category: row.category,
        });
    }

    counts
        .into_iter()
        .map(|c| CountryStats {
            recent_tips: by_country.remove(&c.id).unwrap_or_default(),
            tip_count: c.tip_count,
            last_post_date: c.last_post_date,
            country: Country {
                id: c.id,
                code: c.code,
                name: c.name,
                flag_emoji: c.flag_emoji,
                area: c.area,
            },
        })
        .collect()
}
