//! Tag handlers

use axum::{extract::State, Json};

use crate::AppState;
use quire_common::{
    errors::Result,
    tags::{self, TagWithPostCount},
};

/// Every tag with the number of posts using it
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<TagWithPostCount>>> {
    Ok(Json(tags::list_tags_with_post_count(state.db.read()).await?))
}
