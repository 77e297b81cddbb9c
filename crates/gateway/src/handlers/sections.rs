//! Section handlers

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use super::{json_rejection, path_rejection, validation_error};
use crate::AppState;
use quire_common::{
    db::models::Section,
    errors::Result,
    sections,
};

/// Body for creating or renaming a section
#[derive(Debug, Deserialize, Validate)]
pub struct SectionRequest {
    #[validate(length(min = 5, max = 25))]
    pub name: String,
}

pub async fn list_sections(State(state): State<AppState>) -> Result<Json<Vec<Section>>> {
    Ok(Json(sections::list_sections(state.db.read()).await?))
}

pub async fn get_section(
    State(state): State<AppState>,
    section_id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<Section>> {
    let Path(section_id) = section_id.map_err(path_rejection)?;
    Ok(Json(sections::get_section(state.db.read(), section_id).await?))
}

pub async fn create_section(
    State(state): State<AppState>,
    request: std::result::Result<Json<SectionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Section>)> {
    let Json(request) = request.map_err(json_rejection)?;
    request.validate().map_err(validation_error)?;

    let section = sections::create_section(state.db.write(), &request.name).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn rename_section(
    State(state): State<AppState>,
    section_id: std::result::Result<Path<i32>, PathRejection>,
    request: std::result::Result<Json<SectionRequest>, JsonRejection>,
) -> Result<Json<Section>> {
    let Path(section_id) = section_id.map_err(path_rejection)?;
    let Json(request) = request.map_err(json_rejection)?;
    request.validate().map_err(validation_error)?;

    let section = sections::rename_section(state.db.write(), section_id, &request.name).await?;
    Ok(Json(section))
}
