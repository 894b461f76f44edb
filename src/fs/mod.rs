//! Filesystem helpers for the client-side queue.

mod atomic;

pub use atomic::{atomic_write, atomic_write_file};
