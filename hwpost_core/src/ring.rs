// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Broadcast rings.
//!
//! A [`BroadcastRing`] is a fixed-capacity, sequence-numbered ring with one
//! writer and any number of readers. Readers keep their own cursor (the last
//! sequence they consumed) and only ever look at the newest record, so a slow
//! reader skips records instead of stalling the writer.
//!
//! The posting thread writes a [`VsyncRecord`](crate::vsync::VsyncRecord)
//! into the vsync ring every trusted vsync and reads the config ring once per
//! iteration.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

/// Errors creating a ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RingError {
    /// A ring must hold at least one record.
    #[error("broadcast ring capacity must be non-zero")]
    ZeroCapacity,
}

#[derive(Debug)]
struct RingState<T> {
    records: VecDeque<(u32, T)>,
    next_sequence: u32,
}

/// Fixed-capacity last-value-wins ring.
#[derive(Debug)]
pub struct BroadcastRing<T> {
    capacity: usize,
    state: Mutex<RingState<T>>,
}

impl<T: Copy> BroadcastRing<T> {
    /// Sequence value meaning "nothing consumed yet". Published records start
    /// at 1.
    pub const INITIAL_SEQUENCE: u32 = 0;

    /// Creates an empty ring.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::ZeroCapacity`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            state: Mutex::new(RingState {
                records: VecDeque::with_capacity(capacity),
                next_sequence: 1,
            }),
        })
    }

    /// Appends a record, evicting the oldest when full. Returns its sequence.
    pub fn publish(&self, record: T) -> u32 {
        let mut state = self.state.lock();
        let sequence = state.next_sequence;
        state.next_sequence = sequence.wrapping_add(1).max(1);
        if state.records.len() == self.capacity {
            state.records.pop_front();
        }
        state.records.push_back((sequence, record));
        sequence
    }

    /// Returns the newest record if it was published after `*sequence`, and
    /// moves the cursor to it.
    pub fn newest(&self, sequence: &mut u32) -> Option<T> {
        let state = self.state.lock();
        let &(newest, record) = state.records.back()?;
        if newest == *sequence {
            return None;
        }
        *sequence = newest;
        Some(record)
    }

    /// Returns the newest record regardless of any cursor.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        self.state.lock().records.back().map(|&(_, r)| r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            BroadcastRing::<u32>::new(0).err(),
            Some(RingError::ZeroCapacity)
        );
    }

    #[test]
    fn reader_sees_only_newest() {
        let ring = BroadcastRing::new(2).expect("non-zero capacity");
        let mut cursor = BroadcastRing::<u8>::INITIAL_SEQUENCE;
        assert_eq!(ring.newest(&mut cursor), None);

        ring.publish(1_u8);
        ring.publish(2);
        ring.publish(3);
        assert_eq!(ring.newest(&mut cursor), Some(3));
        assert_eq!(cursor, 3);
        assert_eq!(ring.newest(&mut cursor), None, "already consumed");

        ring.publish(4);
        assert_eq!(ring.newest(&mut cursor), Some(4));
        assert_eq!(ring.latest(), Some(4));
    }

    #[test]
    fn independent_cursors() {
        let ring = BroadcastRing::new(4).expect("non-zero capacity");
        let mut a = 0;
        let mut b = 0;
        ring.publish(10_i32);
        assert_eq!(ring.newest(&mut a), Some(10));
        ring.publish(20);
        assert_eq!(ring.newest(&mut b), Some(20));
        assert_eq!(ring.newest(&mut a), Some(20));
    }
}
