// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_repository;
pub mod object_store;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use object_store::{ObjectStore, StoreError};
pub use time_provider::TimeProvider;
