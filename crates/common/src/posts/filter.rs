//! Post filtering
//!
//! Turns a [`PostFilter`] into a sea-orm [`Condition`]. Each present field
//! narrows the result (AND); absent fields match everything.

use crate::db::models::{PostColumn, PostEntity, PostTagColumn, PostTagEntity, TagColumn, TagEntity};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr, Query};
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Criteria for listing posts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostFilter {
    /// Case-insensitive substring of the title. Folding of non-ASCII letters
    /// follows the backend's `LOWER`: full Unicode on PostgreSQL, ASCII only
    /// on SQLite.
    pub title: Option<String>,

    pub section_id: Option<i32>,

    /// Post must carry every one of these tags
    #[serde(default)]
    pub tags: Vec<String>,

    /// Exclusive lower bound on `created_at`
    pub created_at_gt: Option<DateTime<Utc>>,

    /// Exclusive upper bound on `created_at`
    pub created_at_lt: Option<DateTime<Utc>>,
}

impl PostFilter {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Build the WHERE predicate for `filter` against the `posts` table
pub fn build_predicate(filter: &PostFilter) -> Condition {
    let mut cond = Condition::all();

    if let Some(title) = filter.title.as_deref() {
        let pattern = format!("%{}%", escape_like(&title.to_lowercase()));
        cond = cond.add(
            Expr::expr(Func::lower(Expr::col((PostEntity, PostColumn::Title))))
                .like(LikeExpr::new(pattern).escape('\\')),
        );
    }

    if let Some(section_id) = filter.section_id {
        cond = cond.add(PostColumn::SectionId.eq(section_id));
    }

    // one membership test per distinct name: all of them must hold
    let tags: BTreeSet<&str> = filter.tags.iter().map(String::as_str).collect();
    for name in tags {
        cond = cond.add(PostColumn::Id.in_subquery(posts_tagged(name)));
    }

    if let Some(after) = filter.created_at_gt {
        cond = cond.add(PostColumn::CreatedAt.gt(after));
    }

    if let Some(before) = filter.created_at_lt {
        cond = cond.add(PostColumn::CreatedAt.lt(before));
    }

    cond
}

/// `SELECT post_id FROM post_tags JOIN tags ... WHERE tags.name = $name`
fn posts_tagged(name: &str) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column((PostTagEntity, PostTagColumn::PostId))
        .from(PostTagEntity)
        .inner_join(
            TagEntity,
            Expr::col((TagEntity, TagColumn::Id)).equals((PostTagEntity, PostTagColumn::TagId)),
        )
        .and_where(Expr::col((TagEntity, TagColumn::Name)).eq(name))
        .to_owned()
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
