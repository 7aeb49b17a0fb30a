//! Data models fetched through the query cache.

pub mod post;

pub use post::Post;
