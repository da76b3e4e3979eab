// Shared constants (no magic values scattered through the code)

use std::time::Duration;

/// Default number of simultaneous worker executions (host CPU/GPU bound)
pub const DEFAULT_WORKER_SLOTS: usize = 2;

/// Default ceiling after which a PROCESSING job is force-failed
pub const DEFAULT_PROCESSING_CEILING: Duration = Duration::from_secs(30 * 60);

/// Worker -> lifecycle event channel capacity
pub const WORKER_EVENT_CAPACITY: usize = 256;

/// Per-job progress side channel capacity
pub const PROGRESS_CHANNEL_CAPACITY: usize = 32;

/// Broadcast hub backlog per topic; laggards beyond this are dropped
pub const BROADCAST_CAPACITY: usize = 256;

/// Retention defaults for the sweeper
pub const DEFAULT_DISMISSED_RETENTION: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_TERMINAL_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
