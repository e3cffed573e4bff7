//! Low-level primitives for building the storage engine.
//!
//! Positioned file I/O, the write-ahead log and cooperative cancellation.

/// Deadlines and cancellation tokens for long-running reads.
pub mod concurrency;

/// I/O abstractions over files and memory buffers.
pub mod io;

/// Write-ahead logging (WAL) for crash recovery.
///
/// Ensures durability through sequential logging of every mutation.
pub mod wal;
