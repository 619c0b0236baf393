//! Thread pool primitives.
//!
//! - **`queue`**: bounded blocking queue with an explicit close
//! - **`worker`**: fixed-size pool of joinable worker threads fed by a queue

pub mod queue;
pub mod worker;

pub use queue::{BlockQueue, PushError};
pub use worker::{PoolClosed, Task, TrySubmitError, WorkerPool};
