// Application Layer - use cases and stateful managers

pub mod hub;
pub mod lifecycle;
pub mod pool;
pub mod retention;
pub mod rotation;
pub mod store;

pub use hub::BroadcastHub;
pub use lifecycle::JobLifecycleManager;
pub use pool::{WorkerEvent, WorkerPool};
pub use retention::{RetentionConfig, RetentionSweeper};
pub use rotation::RotationManager;
pub use store::{JobFilter, JobStore};
