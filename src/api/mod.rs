//! API Module
//!
//! HTTP fetch functions used as query fetchers by the demo binary.
//!
//! # Endpoints
//! - `GET /posts` - All posts
//! - `GET /posts/{id}` - A single post

pub mod posts;

pub use posts::PostsApi;
