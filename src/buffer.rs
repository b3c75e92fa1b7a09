//! Growable byte buffer for secret input
//!
//! Capacity is managed explicitly rather than left to `Vec`: the first growth
//! allocates `MIN_CAPACITY` bytes and each later growth doubles. Every growth
//! moves the contents into a fresh allocation so the superseded one can be
//! wiped; `Vec`'s own reallocation would leave a copy of the secret behind.

use std::fmt;
use std::ops::Deref;

use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, SecretioError};

/// Size of the first allocation.
pub const MIN_CAPACITY: usize = 256;

/// Secret bytes read from an input stream.
///
/// The contents are zeroed when the buffer is dropped.
pub struct InputBuffer {
    bytes: Zeroizing<Vec<u8>>,
    capacity: usize,
    reallocations: usize,
}

impl InputBuffer {
    /// An empty buffer with nothing allocated.
    pub fn new() -> Self {
        Self {
            bytes: Zeroizing::new(Vec::new()),
            capacity: 0,
            reallocations: 0,
        }
    }

    /// Number of bytes stored.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Allocated size in bytes. Always at least `len()`.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Growths after the initial allocation.
    pub fn reallocations(&self) -> usize {
        self.reallocations
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn last(&self) -> Option<u8> {
        self.bytes.last().copied()
    }

    /// Appends one byte, growing first if the buffer is full.
    pub fn push(&mut self, byte: u8) -> Result<()> {
        if self.capacity == self.bytes.len() {
            self.grow()?;
        }
        self.bytes.push(byte);
        Ok(())
    }

    /// Drops the last byte, if any. Dropped bytes are wiped.
    pub fn pop(&mut self) -> Option<u8> {
        let byte = self.bytes.pop();
        // pop() leaves the value in the spare capacity.
        if let Some(slot) = self.bytes.spare_capacity_mut().first_mut() {
            slot.write(0);
        }
        byte
    }

    /// Hands the bytes to the caller. Still zeroed on drop.
    pub fn into_bytes(self) -> Zeroizing<Vec<u8>> {
        self.bytes
    }

    fn grow(&mut self) -> Result<()> {
        let new_capacity = if self.capacity == 0 {
            MIN_CAPACITY
        } else {
            self.capacity.checked_mul(2).ok_or_else(out_of_memory)?
        };

        let mut next = Vec::new();
        next.try_reserve_exact(new_capacity).map_err(|e| {
            SecretioError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::OutOfMemory,
                "memory allocation error",
                e,
            )
        })?;
        next.extend_from_slice(&self.bytes);

        if self.capacity > 0 {
            self.reallocations += 1;
        }
        // The old allocation is zeroed when the replaced `Zeroizing` drops.
        self.bytes = Zeroizing::new(next);
        self.capacity = new_capacity;
        Ok(())
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for InputBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for InputBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

fn out_of_memory() -> SecretioError {
    SecretioError::with_kind(
        ErrorCategory::Internal,
        ErrorKind::OutOfMemory,
        "memory allocation error",
    )
}
