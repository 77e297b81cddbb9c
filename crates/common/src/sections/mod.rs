//! Section management
//!
//! Every post belongs to exactly one section. Sections are never deleted
//! here; what should happen to their posts is an open decision.

use crate::db::models::{Section, SectionActiveModel, SectionColumn, SectionEntity};
use crate::errors::{AppError, Result};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};

/// Fetch a section or fail with `SectionNotFound`
pub async fn get_section<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Section> {
    SectionEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::SectionNotFound { id })
}

/// All sections ordered by name
pub async fn list_sections<C: ConnectionTrait>(conn: &C) -> Result<Vec<Section>> {
    SectionEntity::find()
        .order_by_asc(SectionColumn::Name)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Create a section; the name must be unused
pub async fn create_section<C: ConnectionTrait>(conn: &C, name: &str) -> Result<Section> {
    let section = SectionActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| AppError::from_unique_violation(e, format!("section '{}' already exists", name)))?;

    tracing::info!(section_id = section.id, name = %section.name, "Section created");
    Ok(section)
}

/// Rename a section
pub async fn rename_section<C: ConnectionTrait>(conn: &C, id: i32, name: &str) -> Result<Section> {
    let mut section: SectionActiveModel = get_section(conn, id).await?.into();
    section.name = Set(name.to_string());

    section
        .update(conn)
        .await
        .map_err(|e| AppError::from_unique_violation(e, format!("section '{}' already exists", name)))
}
