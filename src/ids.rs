//! Time-sortable record identifiers.
//!
//! Identifiers are ULIDs: a 48-bit millisecond timestamp followed by 80 bits
//! of entropy, rendered as 26 characters of Crockford base32. A single
//! [`IdGenerator`] is shared by every request so that identifiers produced
//! within the same millisecond still sort in generation order.

use parking_lot::Mutex;
use std::time::SystemTime;
use ulid::{Generator, Ulid};

/// Shared, monotonic ULID generator.
pub struct IdGenerator {
    inner: Mutex<Generator>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Produce the next identifier.
    ///
    /// When the clock has not moved past the previous identifier's
    /// millisecond the generator increments the previous entropy instead of
    /// drawing fresh randomness, which keeps the output strictly increasing
    /// even if the system clock steps backwards.
    pub fn next(&self) -> Ulid {
        loop {
            let attempt = self.inner.lock().generate_from_datetime(SystemTime::now());
            match attempt {
                Ok(id) => return id,
                // 80 bits of entropy exhausted inside one millisecond
                Err(_) => std::thread::yield_now(),
            }
        }
    }

    /// Produce the next identifier in its canonical text form.
    pub fn next_string(&self) -> String {
        self.next().to_string()
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Creation time encoded in an identifier, if the text is a valid ULID.
pub fn created_at(id: &str) -> Option<SystemTime> {
    Ulid::from_string(id).ok().map(|ulid| ulid.datetime())
}
