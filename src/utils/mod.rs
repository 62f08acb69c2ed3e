pub mod format;
pub mod locker;
pub mod retry;

pub use locker::RunLock;
pub use retry::{RetryOutcome, RetryPolicy};
