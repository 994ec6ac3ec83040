// Application Layer - Use Cases and Business Logic

pub mod bundle;
pub mod pipeline;
pub mod publisher;
pub mod recovery;
pub mod registry;

// Re-exports
pub use bundle::{BundleService, CreateRequest};
pub use pipeline::{PipelineConfig, PipelineExecutor};
pub use publisher::{ProgressEvent, ProgressPublisher};
pub use recovery::RecoveryService;
pub use registry::{JobRegistry, Lookup};
