//! Post handlers

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, RawQuery, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::{json_rejection, path_rejection, query_error, validation_error};
use crate::AppState;
use quire_common::{
    errors::Result,
    posts::{self, NewPost, PostDetail, PostFilter, PostPatch, PostReplacement},
};

/// Request to create a post
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 6, max = 60))]
    pub title: String,

    pub body: String,

    pub section_id: i32,

    #[serde(default)]
    #[validate(custom(function = "validate_tag_names"))]
    pub tags: Vec<String>,
}

/// Full replacement (PUT); omitted tags mean "no tags"
#[derive(Debug, Deserialize, Validate)]
pub struct ReplacePostRequest {
    #[validate(length(min = 6, max = 60))]
    pub title: String,

    pub body: String,

    pub section_id: i32,

    #[serde(default)]
    #[validate(custom(function = "validate_tag_names"))]
    pub tags: Vec<String>,
}

/// Partial update (PATCH); omitted or null fields are left alone
#[derive(Debug, Deserialize, Validate)]
pub struct PatchPostRequest {
    #[validate(length(min = 6, max = 60))]
    pub title: Option<String>,

    pub body: Option<String>,

    pub section_id: Option<i32>,

    #[validate(custom(function = "validate_tag_names"))]
    pub tags: Option<Vec<String>>,
}

/// `GET /posts` query string. `tags` may repeat (`?tags=a&tags=b`), hold a
/// comma separated list (`?tags=a,b`), or both.
#[derive(Debug, Default, Deserialize)]
pub struct ListPostsQuery {
    pub title: Option<String>,
    pub section_id: Option<i32>,
    #[serde(skip)]
    pub tags: Vec<String>,
    pub created_at_gt: Option<DateTime<Utc>>,
    pub created_at_lt: Option<DateTime<Utc>>,
}

impl ListPostsQuery {
    /// Parse a raw query string, keeping every `tags` value
    pub fn parse(raw: &str) -> Result<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).map_err(query_error)?;
        let (tags, rest): (Vec<_>, Vec<_>) = pairs.into_iter().partition(|(key, _)| key == "tags");

        let rest = serde_urlencoded::to_string(&rest).map_err(query_error)?;
        let mut query: Self = serde_urlencoded::from_str(&rest).map_err(query_error)?;
        query.tags = tags.into_iter().map(|(_, value)| value).collect();
        Ok(query)
    }
}

impl From<ListPostsQuery> for PostFilter {
    fn from(query: ListPostsQuery) -> Self {
        let tags = query
            .tags
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        PostFilter {
            title: query.title.filter(|t| !t.is_empty()),
            section_id: query.section_id,
            tags,
            created_at_gt: query.created_at_gt,
            created_at_lt: query.created_at_lt,
        }
    }
}

fn validate_tag_names(names: &Vec<String>) -> std::result::Result<(), ValidationError> {
    if names.iter().all(|name| (5..=25).contains(&name.chars().count())) {
        Ok(())
    } else {
        let mut err = ValidationError::new("length");
        err.message = Some("every tag name must be 5 to 25 characters".into());
        Err(err)
    }
}

/// List posts matching the query filters
pub async fn list_posts(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<PostDetail>>> {
    let query = ListPostsQuery::parse(raw.as_deref().unwrap_or_default())?;
    let filter = PostFilter::from(query);

    let found = posts::list_posts(state.db.read(), &filter).await?;

    tracing::debug!(filter = ?filter, results = found.len(), "Posts listed");
    Ok(Json(found))
}

/// Get a post by ID
pub async fn get_post(
    State(state): State<AppState>,
    post_id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<PostDetail>> {
    let Path(post_id) = post_id.map_err(path_rejection)?;
    let post = posts::get_post(state.db.read(), post_id).await?;
    Ok(Json(post))
}

/// Create a post
pub async fn create_post(
    State(state): State<AppState>,
    request: std::result::Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostDetail>)> {
    let Json(request) = request.map_err(json_rejection)?;
    request.validate().map_err(validation_error)?;

    let txn = state.db.begin().await?;
    let post = posts::create_post(
        &txn,
        NewPost {
            title: request.title,
            body: request.body,
            section_id: request.section_id,
            tags: request.tags,
        },
    )
    .await?;
    txn.commit().await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// Replace a post (PUT)
pub async fn replace_post(
    State(state): State<AppState>,
    post_id: std::result::Result<Path<i32>, PathRejection>,
    request: std::result::Result<Json<ReplacePostRequest>, JsonRejection>,
) -> Result<Json<PostDetail>> {
    let Path(post_id) = post_id.map_err(path_rejection)?;
    let Json(request) = request.map_err(json_rejection)?;
    request.validate().map_err(validation_error)?;

    let txn = state.db.begin().await?;
    let post = posts::replace_post(
        &txn,
        post_id,
        PostReplacement {
            title: request.title,
            body: request.body,
            section_id: request.section_id,
            tags: request.tags,
        },
    )
    .await?;
    txn.commit().await?;

    state.schedule_sweep();
    Ok(Json(post))
}

/// Partially update a post (PATCH)
pub async fn patch_post(
    State(state): State<AppState>,
    post_id: std::result::Result<Path<i32>, PathRejection>,
    request: std::result::Result<Json<PatchPostRequest>, JsonRejection>,
) -> Result<Json<PostDetail>> {
    let Path(post_id) = post_id.map_err(path_rejection)?;
    let Json(request) = request.map_err(json_rejection)?;
    request.validate().map_err(validation_error)?;

    let txn = state.db.begin().await?;
    let post = posts::patch_post(
        &txn,
        post_id,
        PostPatch {
            title: request.title,
            body: request.body,
            section_id: request.section_id,
            tags: request.tags,
        },
    )
    .await?;
    txn.commit().await?;

    state.schedule_sweep();
    Ok(Json(post))
}

/// Delete a post
pub async fn delete_post(
    State(state): State<AppState>,
    post_id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<StatusCode> {
    let Path(post_id) = post_id.map_err(path_rejection)?;
    let txn = state.db.begin().await?;
    posts::delete_post(&txn, post_id).await?;
    txn.commit().await?;

    state.schedule_sweep();
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_tags_split_on_commas() {
        let query = ListPostsQuery::parse("tags=rustlang,%20tokio,,serde%20&title=").unwrap();
        let filter = PostFilter::from(query);
        assert_eq!(filter.tags, vec!["rustlang", "tokio", "serde"]);
        assert!(filter.title.is_none());
    }

    #[test]
    fn test_query_tags_may_repeat() {
        let query = ListPostsQuery::parse("tags=rustlang&section_id=4&tags=tokio,serde").unwrap();
        assert_eq!(query.section_id, Some(4));

        let filter = PostFilter::from(query);
        assert_eq!(filter.tags, vec!["rustlang", "tokio", "serde"]);
    }

    #[test]
    fn test_bad_query_values_are_invalid_format() {
        for raw in ["section_id=abc", "created_at_gt=yesterday", "title=a&title=b"] {
            let err = ListPostsQuery::parse(raw).unwrap_err();
            assert_eq!(err.code(), quire_common::errors::ErrorCode::InvalidFormat, "{raw}");
        }
        assert!(PostFilter::from(ListPostsQuery::parse("").unwrap()).is_empty());
    }

    #[test]
    fn test_tag_name_bounds() {
        assert!(validate_tag_names(&vec!["short".into(), "x".repeat(25)]).is_ok());
        assert!(validate_tag_names(&vec!["tiny".into()]).is_err());
        assert!(validate_tag_names(&vec!["x".repeat(26)]).is_err());
        assert!(validate_tag_names(&vec![]).is_ok());
    }

    #[test]
    fn test_patch_title_null_and_missing_are_both_none() {
        let missing: PatchPostRequest = serde_json::from_str(r#"{"body": "b"}"#).unwrap();
        let null: PatchPostRequest = serde_json::from_str(r#"{"title": null}"#).unwrap();
        assert!(missing.title.is_none() && null.title.is_none());
        assert!(missing.tags.is_none());

        let cleared: PatchPostRequest = serde_json::from_str(r#"{"tags": []}"#).unwrap();
        assert_eq!(cleared.tags, Some(vec![]));
    }

    #[test]
    fn test_short_title_fails_validation() {
        let request = CreatePostRequest {
            title: "tiny".into(),
            body: String::new(),
            section_id: 1,
            tags: vec![],
        };
        assert!(request.validate().is_err());
    }
}
