//! Request extractors whose rejections go through `AppError`, so malformed
//! input still gets a JSON error body.

use std::{fmt, str::FromStr};

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer};
use tracing::debug;

use crate::error::AppError;

/// JSON body. Unlike `axum::Json`, a rejection never echoes serde detail.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "json body rejected");
                Err(AppError::BadRequest(json_message(&rejection)))
            }
        }
    }
}

fn json_message(rejection: &JsonRejection) -> &'static str {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body",
        JsonRejection::JsonSyntaxError(_) => "Malformed JSON request body",
        JsonRejection::JsonDataError(_) => "Invalid JSON request body",
        _ => "Unreadable request body",
    }
}

/// Path parameters. An id that cannot be parsed names nothing, so it is a 404.
pub struct AppPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection: PathRejection| {
                debug!(reason = %rejection.body_text(), "path rejected");
                AppError::NotFound("Resource")
            })
    }
}

/// Query string parameters.
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection: QueryRejection| {
                debug!(reason = %rejection.body_text(), "query rejected");
                AppError::BadRequest("Invalid query string")
            })
    }
}

/// Treats `?key=` (blank after trimming) as an absent parameter.
pub(crate) fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = Option::<String>::deserialize(de)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<T>().map(Some).map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct Filter {
        #[serde(default, deserialize_with = "empty_string_as_none")]
        code: Option<String>,
        #[serde(default, deserialize_with = "empty_string_as_none")]
        id: Option<i64>,
        #[serde(default, deserialize_with = "empty_string_as_none")]
        user: Option<Uuid>,
    }

    fn parse(query: &str) -> Result<Filter, QueryRejection> {
        let uri: axum::http::Uri = format!("/posts?{query}").parse().unwrap();
        Query::<Filter>::try_from_uri(&uri).map(|Query(f)| f)
    }

    #[test]
    fn blank_values_are_absent() {
        let f = parse("code=&id=&user=%20").unwrap();
        assert!(f.code.is_none());
        assert!(f.id.is_none());
        assert!(f.user.is_none());
        let f = parse("").unwrap();
        assert!(f.code.is_none());
    }

    #[test]
    fn present_values_parse() {
        let f = parse("code=jp&id=7").unwrap();
        assert_eq!(f.code.as_deref(), Some("jp"));
        assert_eq!(f.id, Some(7));
        assert!(parse("id=seven").is_err());
    }
}
