use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use crate::{
    countries::{
        dto::{CountryItem, CountryList, CountryStatsList},
        repo::{CountryStore, RECENT_TIPS_PER_COUNTRY},
    },
    error::AppError,
    extract::AppPath,
    state::AppState,
};

/// Reference data is public.
pub fn country_routes() -> Router<AppState> {
    Router::new()
        .route("/countries", get(list_countries))
        .route("/countries/stats", get(country_stats))
        .route("/countries/:code", get(get_country))
}

#[instrument(skip(state))]
pub async fn list_countries(State(state): State<AppState>) -> Result<Json<CountryList>, AppError> {
    let countries = state.store.list_countries().await?;
    Ok(Json(CountryList { countries }))
}

#[instrument(skip(state))]
pub async fn get_country(
    State(state): State<AppState>,
    AppPath(code): AppPath<String>,
) -> Result<Json<CountryItem>, AppError> {
    let country = state
        .store
        .find_country_by_code(&code)
        .await?
        .ok_or(AppError::NotFound("Country"))?;
    Ok(Json(CountryItem { country }))
}

#[instrument(skip(state))]
pub async fn country_stats(
    State(state): State<AppState>,
) -> Result<Json<CountryStatsList>, AppError> {
    let countries = state.store.country_stats(RECENT_TIPS_PER_COUNTRY).await?;
    Ok(Json(CountryStatsList { countries }))
}
