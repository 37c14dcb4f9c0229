//! Fair exclusive/shared lock queue.
//!
//! Requests are granted strictly in arrival order. Exclusive requests run
//! alone; shared requests run together as long as they form a contiguous
//! prefix of the queue.

pub mod queue;
pub mod waiter;


pub use queue::LockQueue;
pub use waiter::{Abandoned, Waiter, WaiterId};
