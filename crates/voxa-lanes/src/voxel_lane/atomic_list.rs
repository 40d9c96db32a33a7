// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lock-free per-pixel linked lists over a fixed node pool.
//!
//! A list is a head pointer per pixel plus a shared pool of four-word records.
//! Appending claims a pool slot from an atomic counter, writes the record,
//! swaps it in as the new head and finally links it to the previous head.
//! Slot `0` is never handed out and terminates every list.
//!
//! [`AtomicListAppend`] drives the protocol over any [`AppendTarget`]: the host
//! atomics in [`HostFragmentList`], the reference kernel bindings used by the
//! list-build technique, or a test double. `list_build.wgsl` carries the same
//! sequence as `atomic_list_append`.

use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Head value of an empty list, and `next` of a list's last record.
pub const SENTINEL: u32 = 0;

/// Words per record in the node pool.
pub const RECORD_WORDS: usize = 4;

/// One fragment as stored in the node pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct FragmentRecord {
    /// Pool index of the next record, or [`SENTINEL`].
    pub next: u32,
    /// Straight-alpha RGBA8, red in the low byte.
    pub color: u32,
    /// Voxel `x | y << 16`.
    pub xy: u32,
    /// Voxel `z | axis << 16`.
    pub z_axis: u32,
}

impl FragmentRecord {
    /// The record's four pool words.
    pub fn to_words(self) -> [u32; RECORD_WORDS] {
        [self.next, self.color, self.xy, self.z_axis]
    }

    /// Reads the record stored at `index` from a flat word pool.
    pub fn from_words(pool: &[u32], index: u32) -> Option<Self> {
        let base = index as usize * RECORD_WORDS;
        let words = pool.get(base..base + RECORD_WORDS)?;
        Some(Self {
            next: words[0],
            color: words[1],
            xy: words[2],
            z_axis: words[3],
        })
    }
}

/// Storage a list append runs against.
pub trait AppendTarget {
    /// Failure raised by the underlying storage.
    type Error;

    /// Atomically increments the allocation counter, returning its old value.
    fn claim(&mut self) -> Result<u32, Self::Error>;

    /// Writes every word of the record at pool slot `index`.
    fn write_record(&mut self, index: u32, record: &FragmentRecord) -> Result<(), Self::Error>;

    /// Atomically swaps the head of `pixel` for `index`, returning the old head.
    fn exchange_head(&mut self, pixel: usize, index: u32) -> Result<u32, Self::Error>;

    /// Overwrites the `next` word of the record at `index`.
    fn patch_next(&mut self, index: u32, next: u32) -> Result<(), Self::Error>;
}

/// Result of a single append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record now heads its pixel's list.
    Appended { index: u32, previous: u32 },
    /// The pool was full. The claim still advanced the counter.
    Dropped { index: u32 },
}

/// The append protocol for a pool of `capacity` records, slot 0 included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicListAppend {
    capacity: u32,
}

impl AtomicListAppend {
    pub const fn new(capacity: u32) -> Self {
        Self { capacity }
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pushes `record` onto the list at `pixel`. The caller's `next` is ignored.
    pub fn append<T: AppendTarget>(
        &self,
        target: &mut T,
        pixel: usize,
        record: FragmentRecord,
    ) -> Result<AppendOutcome, T::Error> {
        let index = target.claim()?;
        if index == SENTINEL || index >= self.capacity {
            return Ok(AppendOutcome::Dropped { index });
        }
        target.write_record(
            index,
            &FragmentRecord {
                next: SENTINEL,
                ..record
            },
        )?;
        let previous = target.exchange_head(pixel, index)?;
        target.patch_next(index, previous)?;
        Ok(AppendOutcome::Appended { index, previous })
    }

    /// Fragments dropped so far, given the counter value read back after a build.
    pub fn overflow(&self, counter: u32) -> u32 {
        counter.saturating_sub(self.capacity.max(1))
    }
}

/// Out-of-range access on a host list.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    #[error("pixel {pixel} is outside a grid of {len} heads")]
    PixelOutOfRange { pixel: usize, len: usize },
    #[error("record {index} is outside a pool of {capacity} records")]
    RecordOutOfRange { index: u32, capacity: usize },
}

/// A fragment list living in host atomics.
///
/// The view is `Copy`; each thread appends through its own copy.
#[derive(Debug, Clone, Copy)]
pub struct HostFragmentList<'a> {
    pub heads: &'a [AtomicU32],
    pub nodes: &'a [AtomicU32],
    pub counter: &'a AtomicU32,
}

impl HostFragmentList<'_> {
    fn word(&self, index: u32, word: usize) -> Result<&AtomicU32, ListError> {
        self.nodes
            .get(index as usize * RECORD_WORDS + word)
            .ok_or(ListError::RecordOutOfRange {
                index,
                capacity: self.nodes.len() / RECORD_WORDS,
            })
    }

    /// Resets every head to the sentinel and the counter to 1.
    pub fn clear(&self) {
        for head in self.heads {
            head.store(SENTINEL, Ordering::Relaxed);
        }
        self.counter.store(1, Ordering::Release);
    }

    /// Copies the pool into plain words, for walking.
    pub fn snapshot_nodes(&self) -> Vec<u32> {
        self.nodes.iter().map(|w| w.load(Ordering::Acquire)).collect()
    }

    /// Head of `pixel`, or the sentinel when out of range.
    pub fn head(&self, pixel: usize) -> u32 {
        self.heads
            .get(pixel)
            .map_or(SENTINEL, |h| h.load(Ordering::Acquire))
    }
}

impl AppendTarget for HostFragmentList<'_> {
    type Error = ListError;

    fn claim(&mut self) -> Result<u32, ListError> {
        Ok(self.counter.fetch_add(1, Ordering::AcqRel))
    }

    fn write_record(&mut self, index: u32, record: &FragmentRecord) -> Result<(), ListError> {
        for (i, value) in record.to_words().into_iter().enumerate() {
            self.word(index, i)?.store(value, Ordering::Relaxed);
        }
        Ok(())
    }

    fn exchange_head(&mut self, pixel: usize, index: u32) -> Result<u32, ListError> {
        let head = self.heads.get(pixel).ok_or(ListError::PixelOutOfRange {
            pixel,
            len: self.heads.len(),
        })?;
        Ok(head.swap(index, Ordering::AcqRel))
    }

    fn patch_next(&mut self, index: u32, next: u32) -> Result<(), ListError> {
        self.word(index, 0)?.store(next, Ordering::Release);
        Ok(())
    }
}

/// Follows a list from `head` through a flat word pool.
///
/// At most `capacity` records are visited so a corrupted chain still ends.
/// Records outside the pool end the walk.
pub fn walk(pool: &[u32], head: u32, capacity: u32) -> Vec<(u32, FragmentRecord)> {
    let mut records = Vec::new();
    let mut cursor = head;
    while cursor != SENTINEL && cursor < capacity && records.len() < capacity as usize {
        let Some(record) = FragmentRecord::from_words(pool, cursor) else {
            break;
        };
        records.push((cursor, record));
        cursor = record.next;
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Storage {
        heads: Vec<AtomicU32>,
        nodes: Vec<AtomicU32>,
        counter: AtomicU32,
    }

    impl Storage {
        fn new(pixels: usize, capacity: usize) -> Self {
            let storage = Self {
                heads: (0..pixels).map(|_| AtomicU32::new(0)).collect(),
                nodes: (0..capacity * RECORD_WORDS)
                    .map(|_| AtomicU32::new(0))
                    .collect(),
                counter: AtomicU32::new(0),
            };
            storage.list().clear();
            storage
        }

        fn list(&self) -> HostFragmentList<'_> {
            HostFragmentList {
                heads: &self.heads,
                nodes: &self.nodes,
                counter: &self.counter,
            }
        }
    }

    fn record(tag: u32) -> FragmentRecord {
        FragmentRecord {
            next: 0xdead,
            color: tag,
            xy: 0,
            z_axis: 0,
        }
    }

    #[test]
    fn test_concurrent_pushes_at_one_pixel_form_one_list() {
        const THREADS: u32 = 8;
        const PER_THREAD: u32 = 250;
        let capacity = THREADS * PER_THREAD + 1;
        let storage = Storage::new(4, capacity as usize);
        let append = AtomicListAppend::new(capacity);

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let mut list = storage.list();
                scope.spawn(move || {
                    for i in 0..PER_THREAD {
                        let outcome = append.append(&mut list, 2, record(t * PER_THREAD + i));
                        assert!(matches!(outcome, Ok(AppendOutcome::Appended { .. })));
                    }
                });
            }
        });

        let list = storage.list();
        let walked = walk(&list.snapshot_nodes(), list.head(2), capacity);
        assert_eq!(walked.len(), (THREADS * PER_THREAD) as usize);
        let tags: HashSet<u32> = walked.iter().map(|(_, r)| r.color).collect();
        assert_eq!(tags.len(), walked.len());
        assert_eq!(walked.last().map(|(_, r)| r.next), Some(SENTINEL));
        assert_eq!(list.head(0), SENTINEL);
    }

    #[test]
    fn test_full_pool_drops_and_keeps_counting() {
        let storage = Storage::new(1, 4);
        let append = AtomicListAppend::new(4);
        let mut list = storage.list();
        let outcomes: Vec<_> = (0..6)
            .map(|i| append.append(&mut list, 0, record(i)).unwrap())
            .collect();
        assert_eq!(
            outcomes[0],
            AppendOutcome::Appended {
                index: 1,
                previous: SENTINEL
            }
        );
        assert_eq!(
            outcomes[2],
            AppendOutcome::Appended {
                index: 3,
                previous: 2
            }
        );
        assert_eq!(outcomes[3], AppendOutcome::Dropped { index: 4 });
        let counter = storage.counter.load(Ordering::Acquire);
        assert_eq!(counter, 7);
        assert_eq!(append.overflow(counter), 3);
        let walked = walk(&list.snapshot_nodes(), list.head(0), 4);
        let order: Vec<u32> = walked.iter().map(|(i, _)| *i).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[test]
    fn test_walk_stops_on_a_cycle() {
        // 1 -> 2 -> 1 -> ...
        let pool = [0, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0];
        assert_eq!(walk(&pool, 1, 3).len(), 3);
    }

    #[test]
    fn test_out_of_range_pixel_is_an_error() {
        let storage = Storage::new(1, 4);
        let mut list = storage.list();
        let err = AtomicListAppend::new(4)
            .append(&mut list, 9, record(0))
            .unwrap_err();
        assert_eq!(err, ListError::PixelOutOfRange { pixel: 9, len: 1 });
    }
}
