//! Posts: the aggregate service and its filtering

pub mod filter;
pub mod service;

pub use filter::{build_predicate, PostFilter};
pub use service::{
    create_post, delete_post, get_post, list_posts, patch_post, replace_post, NewPost, PostDetail,
    PostPatch, PostReplacement,
};
