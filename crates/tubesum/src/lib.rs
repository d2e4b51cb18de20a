pub mod db;
pub mod error;
pub mod heartbeat;
pub mod lock;
pub mod pipeline;
pub mod provider;
pub mod recovery;
pub mod scheduler;
pub mod settings;
pub mod sweep;
pub mod throttle;
pub mod validators;

pub use db::{default_database_path, Database, DatabaseError};
pub use error::{Result, TubesumError};
pub use heartbeat::Heartbeat;
pub use lock::{InstanceLock, LockGuard, ProcessProbe};
pub use pipeline::{PipelineRunner, StageOutcome, VideoTask};
pub use recovery::{RecoveryReport, StuckSweeper};
pub use scheduler::SweepScheduler;
pub use settings::SweepSettings;
pub use sweep::{Orchestrator, SweepOutcome, SweepStats};
pub use throttle::RateLimiter;
