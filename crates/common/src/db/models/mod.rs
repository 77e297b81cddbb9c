//! SeaORM entity models
//!
//! Database entities for Quire

mod post;
mod post_tag;
mod section;
mod tag;

pub use post::{
    Entity as PostEntity,
    Model as Post,
    ActiveModel as PostActiveModel,
    Column as PostColumn,
};

pub use section::{
    Entity as SectionEntity,
    Model as Section,
    ActiveModel as SectionActiveModel,
    Column as SectionColumn,
};

pub use tag::{
    Entity as TagEntity,
    Model as Tag,
    ActiveModel as TagActiveModel,
    Column as TagColumn,
};

pub use post_tag::{
    Entity as PostTagEntity,
    Model as PostTag,
    ActiveModel as PostTagActiveModel,
    Column as PostTagColumn,
};
