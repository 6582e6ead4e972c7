//! Bluesky/ATProto related functionality

pub mod client;
pub mod records;
pub mod uri;

pub use client::{BskyClient, QueryParams};
