// src/acquisition/ring_buffer.rs
//! Versioned ring buffer decoupling the acquisition and processing threads
//!
//! The buffer keeps the most recent `capacity` payloads together with a
//! global sequence counter. Writers never block: once full, the oldest slot
//! is overwritten. Readers always receive clones of the newest payload and
//! compare its sequence number with the last one they processed to detect
//! staleness.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Ring buffer error types
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// A buffer must hold at least one payload
    #[error("ring buffer capacity must be at least 1")]
    InvalidCapacity,
}

/// A payload tagged with the sequence number it was published under
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedBlock<T> {
    /// Starts at 1 for the first push and increases by 1 per push
    pub sequence: u64,
    pub payload: T,
}

struct RingState<T> {
    slots: Vec<Option<VersionedBlock<T>>>,
    /// Slot the next push writes to
    cursor: usize,
    len: usize,
    sequence: u64,
}

impl<T> RingState<T> {
    fn newest(&self) -> Option<&VersionedBlock<T>> {
        if self.len == 0 {
            return None;
        }
        let capacity = self.slots.len();
        self.slots[(self.cursor + capacity - 1) % capacity].as_ref()
    }
}

/// Bounded, overwrite-oldest buffer with a monotone version counter
pub struct VersionedRingBuffer<T> {
    state: Mutex<RingState<T>>,
    updated: Condvar,
    capacity: usize,
}

impl<T: Clone> VersionedRingBuffer<T> {
    /// Create a buffer retaining the last `capacity` payloads
    pub fn new(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidCapacity);
        }
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Ok(Self {
            state: Mutex::new(RingState {
                slots,
                cursor: 0,
                len: 0,
                sequence: 0,
            }),
            updated: Condvar::new(),
            capacity,
        })
    }

    /// Publish a payload, overwriting the oldest one when full
    ///
    /// Returns the sequence number assigned to `item`.
    pub fn push(&self, item: T) -> u64 {
        let sequence = {
            let mut state = self.state.lock();
            state.sequence += 1;
            let sequence = state.sequence;
            let cursor = state.cursor;
            state.slots[cursor] = Some(VersionedBlock {
                sequence,
                payload: item,
            });
            state.cursor = (cursor + 1) % self.capacity;
            state.len = (state.len + 1).min(self.capacity);
            sequence
        };
        self.updated.notify_all();
        sequence
    }

    /// Newest payload, or `None` if nothing is buffered
    pub fn try_latest(&self) -> Option<VersionedBlock<T>> {
        self.state.lock().newest().cloned()
    }

    /// Block until a payload newer than `last_seen` exists, then return the newest
    pub fn latest_or_wait(&self, last_seen: u64) -> VersionedBlock<T> {
        let mut state = self.state.lock();
        loop {
            if state.sequence > last_seen {
                if let Some(newest) = state.newest() {
                    return newest.clone();
                }
            }
            self.updated.wait(&mut state);
        }
    }

    /// Like [`latest_or_wait`](Self::latest_or_wait) but gives up after `timeout`
    pub fn latest_or_wait_timeout(
        &self,
        last_seen: u64,
        timeout: Duration,
    ) -> Option<VersionedBlock<T>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if state.sequence > last_seen {
                if let Some(newest) = state.newest() {
                    return Some(newest.clone());
                }
            }
            if self.updated.wait_until(&mut state, deadline).timed_out() {
                return None;
            }
        }
    }

    /// Every buffered payload, oldest first
    pub fn snapshot(&self) -> Vec<VersionedBlock<T>> {
        let state = self.state.lock();
        let start = (state.cursor + self.capacity - state.len) % self.capacity;
        (0..state.len)
            .filter_map(|i| state.slots[(start + i) % self.capacity].clone())
            .collect()
    }

    /// Drop every payload. The sequence counter keeps running.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.slots.iter_mut().for_each(|slot| *slot = None);
        state.cursor = 0;
        state.len = 0;
    }

    /// True when no payload is buffered
    pub fn is_empty(&self) -> bool {
        self.state.lock().len == 0
    }

    /// True once `capacity` payloads are buffered
    pub fn is_full(&self) -> bool {
        self.state.lock().len == self.capacity
    }

    /// Number of buffered payloads
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    /// Maximum number of buffered payloads
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number of the newest push, 0 before the first
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }
}
