//! Server error codes the driver has no constants for.

use mongodb::error::{BulkWriteFailure, Error as DbError, ErrorKind, WriteFailure};

/// Unique index violation.
pub const DUPLICATE_KEY: i32 = 11000;

/// Did a write fail because another document already holds its unique key?
///
/// For versioned saves this means another writer got there first.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY,
        ErrorKind::BulkWrite(BulkWriteFailure {
            write_errors: Some(ref errors),
            ..
        }) => errors.iter().any(|e| e.code == DUPLICATE_KEY),
        _ => false,
    }
}
