//! Shared `SQLite` connection handling for the memory and ledger stores.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex lock with poison recovery.
///
/// If the mutex is poisoned (a panic in a previous critical section), the
/// inner value is recovered with a warning. The connection state is still
/// valid; abandoning it would turn one failed turn into a dead store.
pub(crate) fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("store mutex was poisoned, recovering");
            metrics::counter!("store_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a connection for single-writer multi-reader access.
///
/// - WAL journal: readers are non-blocking against the single writer
/// - NORMAL synchronous: durability/performance balance
/// - 30 s busy timeout: a writer retries against brief reader locks
pub(crate) fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a result string; pragma_update treats that as an
    // error, so the result is deliberately ignored.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "30000");
    Ok(())
}

/// Maps a rusqlite error into a storage error for an operation.
pub(crate) fn storage_error(operation: &str, err: &rusqlite::Error) -> Error {
    Error::Storage {
        operation: operation.to_string(),
        cause: err.to_string(),
    }
}

/// Encodes an embedding as a fixed-width little-endian f32 blob.
#[must_use]
pub(crate) fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for value in vector {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decodes a little-endian f32 blob back into an embedding.
#[must_use]
pub(crate) fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_lock_concurrent() {
        let mutex = Arc::new(Mutex::new(0));
        let mut handles = vec![];
        for _ in 0..8 {
            let mutex_clone = Arc::clone(&mutex);
            handles.push(thread::spawn(move || {
                let mut guard = acquire_lock(&mutex_clone);
                *guard += 1;
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*acquire_lock(&mutex), 8);
    }

    #[test]
    fn test_configure_connection_pragmas() {
        let conn = Connection::open_in_memory().unwrap();
        configure_connection(&conn).unwrap();

        let synchronous: i32 = conn
            .pragma_query_value(None, "synchronous", |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 1, "expected NORMAL synchronous mode");

        let busy_timeout: i32 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 30_000);
    }

    #[test]
    fn test_vector_blob_round_trip() {
        let vector = vec![0.25f32, -1.5, 3.75, 0.0];
        assert_eq!(blob_to_vector(&vector_to_blob(&vector)), vector);
    }

    #[test]
    fn test_blob_to_vector_ignores_trailing_bytes() {
        let mut blob = vector_to_blob(&[1.0f32]);
        blob.push(0xFF);
        assert_eq!(blob_to_vector(&blob), vec![1.0f32]);
    }
}
