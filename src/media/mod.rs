//! Media module for post representation and response classification.

pub mod classify;
pub mod post;

pub use classify::{classify, ResponseKind};
pub use post::{ImageLink, ImageResult, Post, PostRef, ResolveReason};
