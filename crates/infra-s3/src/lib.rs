// Baler Infrastructure - S3 Adapter
// Implements: ObjectStore against AWS S3 or any S3-compatible endpoint

mod client;
mod object_store;

pub use client::{build_client, S3Config};
pub use object_store::S3ObjectStore;
