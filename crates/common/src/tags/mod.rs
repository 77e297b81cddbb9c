//! Tag lifecycle
//!
//! Tags are created on demand when a post asks for a name nobody has used
//! yet, shared between posts by exact (case-sensitive) name, and removed once
//! the last post referencing them lets go. Removal is a separate sweep, see
//! [`collect_orphans`] and [`OrphanSweeper`].

mod sweeper;

pub use sweeper::OrphanSweeper;

use crate::db::models::{PostTagColumn, PostTagEntity, Tag, TagActiveModel, TagColumn, TagEntity};
use crate::errors::Result;
use crate::metrics;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Tags for a set of requested names, split by whether this call created them
#[derive(Debug, Clone, Default)]
pub struct ResolvedTags {
    pub existing: Vec<Tag>,
    /// Missing at lookup time. May include rows a concurrent writer
    /// inserted between the lookup and our insert.
    pub created: Vec<Tag>,
}

impl ResolvedTags {
    pub fn len(&self) -> usize {
        self.existing.len() + self.created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.existing.is_empty() && self.created.is_empty()
    }

    pub fn into_all(self) -> Vec<Tag> {
        let mut all = self.existing;
        all.extend(self.created);
        all
    }
}

/// A tag together with the number of posts that currently reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct TagWithPostCount {
    pub id: i32,
    pub name: String,
    pub post_count: i64,
}

/// Resolve requested tag names to persisted tags, creating the missing ones.
///
/// Duplicates in `names` collapse to one tag. New rows are written through
/// `conn`, so inside a transaction they stay invisible to others until the
/// caller commits. A concurrent writer inserting the same name first is not an
/// error: the insert is skipped and the row is picked up by the second lookup.
pub async fn resolve_tags<C: ConnectionTrait>(conn: &C, names: &[String]) -> Result<ResolvedTags> {
    let unique: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    if unique.is_empty() {
        return Ok(ResolvedTags::default());
    }

    let existing = TagEntity::find()
        .filter(TagColumn::Name.is_in(unique.iter().copied()))
        .all(conn)
        .await?;

    let known: HashSet<&str> = existing.iter().map(|tag| tag.name.as_str()).collect();
    let missing: Vec<&str> = unique
        .iter()
        .copied()
        .filter(|name| !known.contains(name))
        .collect();

    if missing.is_empty() {
        return Ok(ResolvedTags {
            existing,
            created: Vec::new(),
        });
    }

    let created = insert_missing(conn, &missing).await?;

    tracing::debug!(
        requested = unique.len(),
        reused = existing.len(),
        created = created.len(),
        "Resolved tags"
    );

    Ok(ResolvedTags { existing, created })
}

/// Insert `names` into `tags` and return the rows now stored under them.
///
/// Names that already exist, including ones a concurrent writer committed
/// after our lookup, hit `ON CONFLICT DO NOTHING` and are read back as is.
async fn insert_missing<C: ConnectionTrait>(conn: &C, names: &[&str]) -> Result<Vec<Tag>> {
    if names.is_empty() {
        return Ok(Vec::new());
    }

    let inserted = TagEntity::insert_many(names.iter().map(|name| TagActiveModel {
        name: Set((*name).to_string()),
        ..Default::default()
    }))
    .on_conflict(OnConflict::column(TagColumn::Name).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    // rows_affected skips conflicting names, so the counter stays exact
    metrics::record_tags_created(inserted as usize);

    TagEntity::find()
        .filter(TagColumn::Name.is_in(names.iter().copied()))
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Delete every tag that no post references and return what was removed.
///
/// A full scan over `tags`; association changes must already be visible to
/// `conn` (same transaction, or committed).
pub async fn collect_orphans<C: ConnectionTrait>(conn: &C) -> Result<Vec<Tag>> {
    let orphans = TagEntity::find()
        .left_join(PostTagEntity)
        .group_by(TagColumn::Id)
        .having(Expr::expr(Expr::col((PostTagEntity, PostTagColumn::PostId)).count()).eq(0))
        .all(conn)
        .await?;

    if orphans.is_empty() {
        return Ok(orphans);
    }

    let ids: Vec<i32> = orphans.iter().map(|tag| tag.id).collect();
    let result = TagEntity::delete_many()
        .filter(TagColumn::Id.is_in(ids))
        .exec(conn)
        .await?;

    tracing::info!(
        removed = result.rows_affected,
        tags = ?orphans.iter().map(|tag| tag.name.as_str()).collect::<Vec<_>>(),
        "Removed orphaned tags"
    );

    Ok(orphans)
}

/// Every tag with its post count, orphans included, ordered by name
pub async fn list_tags_with_post_count<C: ConnectionTrait>(conn: &C) -> Result<Vec<TagWithPostCount>> {
    TagEntity::find()
        .select_only()
        .column(TagColumn::Id)
        .column(TagColumn::Name)
        .column_as(Expr::col((PostTagEntity, PostTagColumn::PostId)).count(), "post_count")
        .left_join(PostTagEntity)
        .group_by(TagColumn::Id)
        .group_by(TagColumn::Name)
        .order_by_asc(TagColumn::Name)
        .into_model::<TagWithPostCount>()
        .all(conn)
        .await
        .map_err(Into::into)
}
