//! Post aggregate operations
//!
//! Every function works on the connection or transaction it is given; the
//! caller owns the unit of work and decides when to commit. Updates and
//! deletes can leave tags without posts; callers schedule
//! [`crate::tags::OrphanSweeper`] once their transaction has committed.

use super::filter::{build_predicate, PostFilter};
use crate::db::models::{
    Post, PostActiveModel, PostColumn, PostEntity, PostTagActiveModel, PostTagColumn,
    PostTagEntity, Section, SectionEntity, Tag, TagEntity,
};
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::sections::get_section;
use crate::tags::resolve_tags;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, LoaderTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

/// Input for creating a post
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub section_id: i32,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Full replacement of a post's editable state (PUT)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostReplacement {
    pub title: String,
    pub body: String,
    pub section_id: i32,
    /// Missing means no tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update (PATCH): `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub section_id: Option<i32>,
    /// `Some(vec![])` clears every tag
    pub tags: Option<Vec<String>>,
}

/// A post with its section and tags resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostDetail {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub section: Section,
    pub tags: Vec<Tag>,
}

impl PostDetail {
    fn assemble(post: Post, section: Section, mut tags: Vec<Tag>) -> Self {
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            id: post.id,
            title: post.title,
            body: post.body,
            created_at: post.created_at,
            updated_at: post.updated_at,
            section,
            tags,
        }
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|tag| tag.name.as_str()).collect()
    }
}

/// Fetch a post with its section and tags
pub async fn get_post<C: ConnectionTrait>(conn: &C, id: i32) -> Result<PostDetail> {
    let post = find_post(conn, id).await?;
    detail(conn, post).await
}

/// Every post matching `filter`, ordered by id
pub async fn list_posts<C: ConnectionTrait>(conn: &C, filter: &PostFilter) -> Result<Vec<PostDetail>> {
    let posts = PostEntity::find()
        .filter(build_predicate(filter))
        .order_by_asc(PostColumn::Id)
        .all(conn)
        .await?;

    hydrate(conn, posts).await
}

/// Create a post in an existing section, creating any tags it names
pub async fn create_post<C: ConnectionTrait>(conn: &C, input: NewPost) -> Result<PostDetail> {
    let section = get_section(conn, input.section_id).await?;

    let post = PostActiveModel {
        title: Set(input.title),
        body: Set(input.body),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        section_id: Set(section.id),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let tags = resolve_tags(conn, &input.tags).await?.into_all();
    link_tags(conn, post.id, &tags).await?;

    metrics::record_post_mutation("create");
    tracing::info!(
        post_id = post.id,
        section_id = section.id,
        tags = tags.len(),
        "Post created"
    );

    Ok(PostDetail::assemble(post, section, tags))
}

/// Overwrite title, body, section and the whole tag set
pub async fn replace_post<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    input: PostReplacement,
) -> Result<PostDetail> {
    let existing = find_post(conn, id).await?;
    let section = get_section(conn, input.section_id).await?;

    let mut post: PostActiveModel = existing.into();
    post.title = Set(input.title);
    post.body = Set(input.body);
    post.section_id = Set(section.id);
    post.updated_at = Set(Some(Utc::now()));
    let post = post.update(conn).await?;

    let tags = replace_tags(conn, post.id, &input.tags).await?;

    metrics::record_post_mutation("replace");
    tracing::info!(post_id = post.id, tags = tags.len(), "Post replaced");

    Ok(PostDetail::assemble(post, section, tags))
}

/// Apply only the fields present in `patch`
pub async fn patch_post<C: ConnectionTrait>(conn: &C, id: i32, patch: PostPatch) -> Result<PostDetail> {
    let existing = find_post(conn, id).await?;
    let section_id = patch.section_id.unwrap_or(existing.section_id);
    let section = get_section(conn, section_id).await?;

    let mut post: PostActiveModel = existing.into();
    if let Some(title) = patch.title {
        post.title = Set(title);
    }
    if let Some(body) = patch.body {
        post.body = Set(body);
    }
    if patch.section_id.is_some() {
        post.section_id = Set(section.id);
    }
    post.updated_at = Set(Some(Utc::now()));
    let post = post.update(conn).await?;

    let tags = match patch.tags {
        Some(names) => replace_tags(conn, post.id, &names).await?,
        None => post_tags(conn, post.id).await?,
    };

    metrics::record_post_mutation("patch");
    tracing::info!(post_id = post.id, "Post patched");

    Ok(PostDetail::assemble(post, section, tags))
}

/// Remove a post and its tag associations
pub async fn delete_post<C: ConnectionTrait>(conn: &C, id: i32) -> Result<()> {
    let post = find_post(conn, id).await?;

    PostTagEntity::delete_many()
        .filter(PostTagColumn::PostId.eq(post.id))
        .exec(conn)
        .await?;
    PostEntity::delete_by_id(post.id).exec(conn).await?;

    metrics::record_post_mutation("delete");
    tracing::info!(post_id = post.id, "Post deleted");

    Ok(())
}

async fn find_post<C: ConnectionTrait>(conn: &C, id: i32) -> Result<Post> {
    PostEntity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::PostNotFound { id })
}

async fn detail<C: ConnectionTrait>(conn: &C, post: Post) -> Result<PostDetail> {
    hydrate(conn, vec![post])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal {
            message: "post vanished while loading relations".to_string(),
        })
}

/// Load sections and tags for a batch of posts in two queries
async fn hydrate<C: ConnectionTrait>(conn: &C, posts: Vec<Post>) -> Result<Vec<PostDetail>> {
    let sections = posts.load_one(SectionEntity, conn).await?;
    let tags = posts.load_many_to_many(TagEntity, PostTagEntity, conn).await?;

    posts
        .into_iter()
        .zip(sections)
        .zip(tags)
        .map(|((post, section), tags)| {
            let section = section.ok_or(AppError::SectionNotFound { id: post.section_id })?;
            Ok(PostDetail::assemble(post, section, tags))
        })
        .collect()
}

async fn post_tags<C: ConnectionTrait>(conn: &C, post_id: i32) -> Result<Vec<Tag>> {
    TagEntity::find()
        .inner_join(PostTagEntity)
        .filter(PostTagColumn::PostId.eq(post_id))
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Swap the post's tag set for the tags named in `names`
async fn replace_tags<C: ConnectionTrait>(conn: &C, post_id: i32, names: &[String]) -> Result<Vec<Tag>> {
    PostTagEntity::delete_many()
        .filter(PostTagColumn::PostId.eq(post_id))
        .exec(conn)
        .await?;

    let tags = resolve_tags(conn, names).await?.into_all();
    link_tags(conn, post_id, &tags).await?;
    Ok(tags)
}

async fn link_tags<C: ConnectionTrait>(conn: &C, post_id: i32, tags: &[Tag]) -> Result<()> {
    if tags.is_empty() {
        return Ok(());
    }

    PostTagEntity::insert_many(tags.iter().map(|tag| PostTagActiveModel {
        post_id: Set(post_id),
        tag_id: Set(tag.id),
    }))
    .exec_without_returning(conn)
    .await?;

    Ok(())
}
