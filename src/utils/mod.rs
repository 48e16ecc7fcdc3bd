pub mod haversine;
pub mod lock_file;
pub mod scheduled_executor;

pub use lock_file::LiveLock;
pub use scheduled_executor::{ScheduledExecutor, ScheduledTask};
