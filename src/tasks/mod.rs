//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the cache.
//!
//! # Tasks
//! - Query GC: Removes unobserved entries once their grace period elapses

mod gc;

pub use gc::spawn_gc_task;
