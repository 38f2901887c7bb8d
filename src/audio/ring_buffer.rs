// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Byte ring shared between the game thread (producer) and the device callback
//! thread (consumer).
//!
//! Offsets are free-running byte counters that are only masked when indexing
//! into storage, so `read <= lock <= write` holds under wrapping arithmetic.
//!
//! - `[read, lock)` has been claimed by the consumer and is never touched by
//!   the producer.
//! - `[lock, write)` is committed but still tentative: every `begin_write`
//!   rewinds `write` back to `lock` and the producer re-renders from there.
//! - `[lock, read + capacity)` is the region handed to the producer.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Smallest ring the engine will allocate, in bytes.
pub const MIN_RING_BUFFER_SIZE: usize = 64 * 1024;

/// State only touched while the handshake lock is held.
struct Handshake {
    /// True until the producer has locked the buffer once.
    first_lock: bool,
}

/// Fixed-capacity single-producer/single-consumer byte ring.
pub struct RingBuffer {
    /// Backing storage. Capacity is always a power of two.
    storage: Box<[UnsafeCell<u8>]>,
    /// `capacity - 1`, used to map offsets into storage.
    mask: usize,
    /// Bytes the device pulls per callback.
    quantum: usize,
    /// Guards the three-offset handshake. Never held while copying data.
    handshake: Mutex<Handshake>,
    /// Consumer position. Advanced only by the consumer.
    read_offset: AtomicUsize,
    /// End of the span the consumer is allowed to read.
    lock_offset: AtomicUsize,
    /// End of committed data.
    write_offset: AtomicUsize,
    /// Bytes handed to the device since the last `begin_write`, silence included.
    buffer_used: AtomicUsize,
    /// Callbacks that had to be padded with silence.
    underruns: AtomicU64,
    /// Total bytes handed to the device, silence included.
    consumed: AtomicU64,
}

// SAFETY: the storage is only written by the single producer inside the region
// returned from `begin_write`, and only read by the single consumer inside
// `[read, lock)`. The handshake keeps those spans disjoint.
unsafe impl Sync for RingBuffer {}

/// A contiguous (modulo wrap) span of the ring the producer may fill.
pub struct WriteRegion<'a> {
    ring: &'a RingBuffer,
    /// Absolute offset of the first writable byte.
    start: usize,
    /// Writable bytes.
    len: usize,
    /// Bytes the device consumed since the previous `begin_write`.
    play_count: usize,
}

/// Snapshot of the ring offsets and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStats {
    pub capacity: usize,
    pub read_offset: usize,
    pub lock_offset: usize,
    pub write_offset: usize,
    pub underruns: u64,
    pub consumed: u64,
}

impl RingStats {
    /// Returns true if `read <= lock <= write` under wrapping arithmetic.
    pub fn offsets_ordered(&self) -> bool {
        let locked = self.lock_offset.wrapping_sub(self.read_offset);
        let written = self.write_offset.wrapping_sub(self.read_offset);
        locked <= written && written <= self.capacity
    }
}

impl RingBuffer {
    /// Creates a ring that holds at least `min_size` bytes and at least one
    /// second of audio, rounded up to a power of two. `quantum` is the number
    /// of bytes the device pulls per callback.
    pub fn new(min_size: usize, bytes_per_second: usize, quantum: usize) -> Self {
        let capacity = min_size.max(bytes_per_second).max(1).next_power_of_two();
        Self::with_capacity(capacity, quantum)
    }

    fn with_capacity(capacity: usize, quantum: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        let storage: Box<[UnsafeCell<u8>]> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Self {
            storage,
            mask: capacity - 1,
            quantum: quantum.min(capacity),
            handshake: Mutex::new(Handshake { first_lock: true }),
            read_offset: AtomicUsize::new(0),
            lock_offset: AtomicUsize::new(0),
            write_offset: AtomicUsize::new(0),
            buffer_used: AtomicUsize::new(0),
            underruns: AtomicU64::new(0),
            consumed: AtomicU64::new(0),
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes the device pulls per callback.
    pub fn quantum(&self) -> usize {
        self.quantum
    }

    /// Opens the next write region.
    ///
    /// Makes sure the consumer has at least one quantum claimed, so it keeps
    /// playing even if the producer stalls before committing, then rewinds the
    /// write cursor to the end of that claim. The returned region reports how
    /// many bytes the device consumed since the previous call.
    pub fn begin_write(&self) -> WriteRegion<'_> {
        let mut handshake = self.handshake.lock();

        let read = self.read_offset.load(Ordering::Acquire);
        let mut lock = self.lock_offset.load(Ordering::Acquire);
        let write = self.write_offset.load(Ordering::Acquire);

        let mut used = lock.wrapping_sub(read);
        if used < self.quantum {
            let available = write.wrapping_sub(read);
            used = self.quantum.min(available);
            lock = read.wrapping_add(used);
            self.lock_offset.store(lock, Ordering::Release);
        }

        self.write_offset.store(lock, Ordering::Release);

        let consumed = self.buffer_used.swap(0, Ordering::AcqRel);
        let play_count = if handshake.first_lock { 0 } else { consumed };
        handshake.first_lock = false;
        drop(handshake);

        WriteRegion {
            ring: self,
            start: lock,
            len: self.capacity() - used,
            play_count,
        }
    }

    /// Publishes the first `written` bytes of the region to the consumer.
    pub fn commit_write(&self, region: WriteRegion<'_>, written: usize) {
        debug_assert!(ptr::eq(region.ring, self));
        let written = written.min(region.len);
        self.write_offset.fetch_add(written, Ordering::Release);
    }

    /// Fills `out` for the device. Never blocks and never waits on the producer.
    ///
    /// Copies as much committed data as is available and pads the rest with
    /// silence. While the producer holds the handshake at most one quantum is
    /// taken. The full length of `out` counts as played time. Returns the
    /// number of bytes taken from the ring.
    pub fn consume(&self, out: &mut [u8]) -> usize {
        let read = self.read_offset.load(Ordering::Acquire);

        let take = match self.handshake.try_lock() {
            Some(_handshake) => {
                let write = self.write_offset.load(Ordering::Acquire);
                let lock = self.lock_offset.load(Ordering::Acquire);
                let take = write.wrapping_sub(read).min(out.len());
                if take > lock.wrapping_sub(read) {
                    self.lock_offset
                        .store(read.wrapping_add(take), Ordering::Release);
                }
                take
            }
            // The producer is mid-handshake. Whatever it decides, it claims at
            // least `min(quantum, write - read)` past this read offset, so up to
            // a quantum of committed data is safe to drain. Raising lock first
            // keeps read from passing it.
            None => {
                let write = self.write_offset.load(Ordering::Acquire);
                let take = write
                    .wrapping_sub(read)
                    .min(self.quantum)
                    .min(out.len());
                let _ = self.lock_offset.fetch_update(
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    |lock| (lock.wrapping_sub(read) < take).then(|| read.wrapping_add(take)),
                );
                take
            }
        };

        let (data, silence) = out.split_at_mut(take);
        // SAFETY: `[read, read + take)` lies inside the consumer's claim.
        unsafe { self.copy_out(read, data) };
        silence.fill(0);
        if !silence.is_empty() {
            self.underruns.fetch_add(1, Ordering::Relaxed);
        }

        self.read_offset
            .store(read.wrapping_add(take), Ordering::Release);
        self.buffer_used.fetch_add(out.len(), Ordering::AcqRel);
        self.consumed.fetch_add(out.len() as u64, Ordering::Relaxed);

        take
    }

    /// Number of callbacks that were padded with silence.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Snapshot of the current offsets and counters.
    pub fn stats(&self) -> RingStats {
        RingStats {
            capacity: self.capacity(),
            read_offset: self.read_offset.load(Ordering::Acquire),
            lock_offset: self.lock_offset.load(Ordering::Acquire),
            write_offset: self.write_offset.load(Ordering::Acquire),
            underruns: self.underruns.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
        }
    }

    fn base(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }

    /// # Safety
    /// The caller must own `[offset, offset + src.len())` and `src.len()` must
    /// not exceed the capacity.
    unsafe fn copy_in(&self, offset: usize, src: &[u8]) {
        let start = offset & self.mask;
        let first = (self.capacity() - start).min(src.len());
        ptr::copy_nonoverlapping(src.as_ptr(), self.base().add(start), first);
        if src.len() > first {
            ptr::copy_nonoverlapping(src.as_ptr().add(first), self.base(), src.len() - first);
        }
    }

    /// # Safety
    /// `[offset, offset + dst.len())` must be claimed by the caller and
    /// `dst.len()` must not exceed the capacity.
    unsafe fn copy_out(&self, offset: usize, dst: &mut [u8]) {
        let start = offset & self.mask;
        let first = (self.capacity() - start).min(dst.len());
        ptr::copy_nonoverlapping(self.base().add(start), dst.as_mut_ptr(), first);
        if dst.len() > first {
            ptr::copy_nonoverlapping(self.base(), dst.as_mut_ptr().add(first), dst.len() - first);
        }
    }

    /// Creates a ring whose counters start at `offset`, to exercise counter wraparound.
    #[cfg(test)]
    fn with_start_offset(capacity: usize, quantum: usize, offset: usize) -> Self {
        let ring = Self::with_capacity(capacity, quantum);
        ring.read_offset.store(offset, Ordering::Relaxed);
        ring.lock_offset.store(offset, Ordering::Relaxed);
        ring.write_offset.store(offset, Ordering::Relaxed);
        ring
    }
}

impl<'a> WriteRegion<'a> {
    /// Writable bytes in this region.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes the device consumed between the previous `begin_write` and this one.
    pub fn play_count(&self) -> usize {
        self.play_count
    }

    /// Copies `bytes` into the region at `offset`, truncating at the region end.
    /// Returns the number of bytes copied.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> usize {
        if offset >= self.len {
            return 0;
        }
        let count = bytes.len().min(self.len - offset);
        // SAFETY: the region belongs to the producer until it is committed, and
        // `count` keeps the copy inside it.
        unsafe {
            self.ring
                .copy_in(self.start.wrapping_add(offset), &bytes[..count])
        };
        count
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("RingBuffer")
            .field("capacity", &stats.capacity)
            .field("quantum", &self.quantum)
            .field("read_offset", &stats.read_offset)
            .field("lock_offset", &stats.lock_offset)
            .field("write_offset", &stats.write_offset)
            .field("underruns", &stats.underruns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn produce(ring: &RingBuffer, bytes: &[u8]) -> usize {
        let mut region = ring.begin_write();
        let written = region.write(0, bytes);
        ring.commit_write(region, written);
        written
    }

    #[test]
    fn test_capacity_rounds_up_to_power_of_two() {
        let ring = RingBuffer::new(MIN_RING_BUFFER_SIZE, 48000 * 8, 1024);
        // One second of stereo f32 at 48kHz is 384000 bytes.
        assert_eq!(ring.capacity(), 524_288);

        let small = RingBuffer::new(MIN_RING_BUFFER_SIZE, 1000, 64);
        assert_eq!(small.capacity(), MIN_RING_BUFFER_SIZE);
    }

    #[test]
    fn test_consume_without_writes_is_silence() {
        let ring = RingBuffer::with_capacity(1024, 64);
        let mut out = vec![0xAAu8; 256];

        assert_eq!(ring.consume(&mut out), 0);
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(ring.underruns(), 1);

        let stats = ring.stats();
        assert_eq!(stats.read_offset, 0);
        assert_eq!(stats.consumed, 256);
        assert!(stats.offsets_ordered());
    }

    #[test]
    fn test_first_lock_reports_no_play_count() {
        let ring = RingBuffer::with_capacity(1024, 64);
        let mut out = [0u8; 128];
        ring.consume(&mut out);

        let region = ring.begin_write();
        assert_eq!(region.play_count(), 0);
        ring.commit_write(region, 0);

        ring.consume(&mut out);
        let region = ring.begin_write();
        assert_eq!(region.play_count(), 128);
    }

    #[test]
    fn test_round_trip_and_partial_underrun() {
        let ring = RingBuffer::with_capacity(1024, 64);
        let data: Vec<u8> = (1..=100).collect();
        assert_eq!(produce(&ring, &data), 100);

        let mut out = [0xFFu8; 64];
        assert_eq!(ring.consume(&mut out), 64);
        assert_eq!(&out[..], &data[..64]);
        assert_eq!(ring.underruns(), 0);

        let mut out = [0xFFu8; 64];
        assert_eq!(ring.consume(&mut out), 36);
        assert_eq!(&out[..36], &data[64..]);
        assert!(out[36..].iter().all(|&b| b == 0));
        assert_eq!(ring.underruns(), 1);
    }

    #[test]
    fn test_consume_never_reads_past_write() {
        let ring = RingBuffer::with_capacity(1024, 64);
        produce(&ring, &[7u8; 10]);

        let mut out = [0xFFu8; 512];
        assert_eq!(ring.consume(&mut out), 10);
        let stats = ring.stats();
        assert_eq!(stats.read_offset, 10);
        assert!(stats.read_offset <= stats.write_offset);
        assert!(out[10..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_begin_write_claims_one_quantum() {
        let ring = RingBuffer::with_capacity(1024, 64);
        produce(&ring, &[1u8; 200]);

        // The next lock claims one quantum for the consumer and rewinds the
        // write cursor to the end of that claim.
        let region = ring.begin_write();
        let stats = ring.stats();
        assert_eq!(stats.lock_offset, 64);
        assert_eq!(stats.write_offset, 64);
        assert_eq!(region.len(), 1024 - 64);
        ring.commit_write(region, 0);

        // Only the claimed quantum is still playable.
        let mut out = [0u8; 128];
        assert_eq!(ring.consume(&mut out), 64);
    }

    #[test]
    fn test_producer_rewrites_unclaimed_data() {
        let ring = RingBuffer::with_capacity(1024, 16);
        produce(&ring, &[1u8; 64]);
        produce(&ring, &[2u8; 64]);

        let mut out = [0u8; 64];
        assert_eq!(ring.consume(&mut out), 64);
        // The first quantum was claimed before the rewrite; the rest was replaced.
        assert!(out[..16].iter().all(|&b| b == 1));
        assert!(out[16..].iter().all(|&b| b == 2));
    }

    #[test]
    fn test_region_never_exceeds_free_space() {
        let ring = RingBuffer::with_capacity(256, 32);
        let mut region = ring.begin_write();
        assert_eq!(region.len(), 256);
        assert_eq!(region.write(0, &[3u8; 300]), 256);
        assert_eq!(region.write(256, &[3u8; 4]), 0);
        ring.commit_write(region, 300);
        assert_eq!(ring.stats().write_offset, 256);

        // Everything is committed but only one quantum is claimed, so the
        // producer may overwrite the rest.
        let region = ring.begin_write();
        assert_eq!(region.len(), 256 - 32);
        ring.commit_write(region, 0);
    }

    #[test]
    fn test_split_copy_across_wrap() {
        let ring = RingBuffer::with_capacity(64, 8);
        produce(&ring, &[0u8; 48]);
        let mut out = [0u8; 48];
        ring.consume(&mut out);

        let data: Vec<u8> = (0..40).collect();
        assert_eq!(produce(&ring, &data), 40);
        let mut out = [0u8; 40];
        assert_eq!(ring.consume(&mut out), 40);
        assert_eq!(&out[..], &data[..]);
    }

    #[test]
    fn test_offsets_wrap_around_counter_limit() {
        let ring = RingBuffer::with_start_offset(64, 8, usize::MAX - 20);
        let data: Vec<u8> = (0..50).collect();
        assert_eq!(produce(&ring, &data), 50);
        assert!(ring.stats().offsets_ordered());

        let mut out = [0u8; 50];
        assert_eq!(ring.consume(&mut out), 50);
        assert_eq!(&out[..], &data[..]);

        let stats = ring.stats();
        assert!(stats.offsets_ordered());
        assert_eq!(stats.read_offset, (usize::MAX - 20).wrapping_add(50));
    }

    #[test]
    fn test_offset_invariant_over_mixed_sequence() {
        let ring = RingBuffer::with_capacity(512, 48);
        let mut out = vec![0u8; 48];
        let sizes = [0usize, 17, 300, 512, 5, 96, 1000, 48, 0, 250];

        for (i, size) in sizes.iter().cycle().take(200).enumerate() {
            let mut region = ring.begin_write();
            assert!(ring.stats().offsets_ordered());
            let chunk = vec![i as u8; *size];
            let written = region.write(0, &chunk);
            ring.commit_write(region, written);
            assert!(ring.stats().offsets_ordered());

            for _ in 0..(i % 4) {
                ring.consume(&mut out);
                assert!(ring.stats().offsets_ordered());
            }
        }
    }

    #[test]
    fn test_consume_while_producer_holds_handshake() {
        let ring = RingBuffer::with_capacity(1024, 64);
        let data: Vec<u8> = (1..=255).cycle().take(512).collect();
        assert_eq!(produce(&ring, &data), 512);

        let mut out = [0u8; 64];
        assert_eq!(ring.consume(&mut out), 64);
        assert_eq!(ring.stats().lock_offset, 64);

        // Nothing is claimed past read, but committed data is still delivered.
        let handshake = ring.handshake.lock();
        let mut out = [0xAAu8; 64];
        assert_eq!(ring.consume(&mut out), 64);
        assert_eq!(&out[..], &data[64..128]);
        assert_eq!(ring.underruns(), 0);

        let stats = ring.stats();
        assert_eq!(stats.read_offset, 128);
        assert_eq!(stats.lock_offset, 128);
        assert!(stats.offsets_ordered());
        drop(handshake);

        // The next lock reports both callbacks as played and starts its claim
        // from the new read offset.
        let region = ring.begin_write();
        assert_eq!(region.play_count(), 128);
        let stats = ring.stats();
        assert_eq!(stats.lock_offset, 192);
        assert_eq!(stats.write_offset, 192);
        assert!(stats.offsets_ordered());
        ring.commit_write(region, 0);
    }

    #[test]
    fn test_contended_consume_is_limited_to_one_quantum() {
        let ring = RingBuffer::with_capacity(1024, 64);
        produce(&ring, &[9u8; 300]);

        let handshake = ring.handshake.lock();
        let mut out = [0xAAu8; 256];
        assert_eq!(ring.consume(&mut out), 64);
        assert!(out[..64].iter().all(|&b| b == 9));
        assert!(out[64..].iter().all(|&b| b == 0));
        assert_eq!(ring.underruns(), 1);

        let stats = ring.stats();
        assert_eq!(stats.read_offset, 64);
        assert_eq!(stats.lock_offset, 64);
        assert!(stats.offsets_ordered());
        drop(handshake);
    }

    #[test]
    fn test_contended_consume_on_empty_ring_is_silence() {
        let ring = RingBuffer::with_capacity(1024, 64);
        let handshake = ring.handshake.lock();

        let mut out = [0xAAu8; 32];
        assert_eq!(ring.consume(&mut out), 0);
        assert!(out.iter().all(|&b| b == 0));
        assert_eq!(ring.underruns(), 1);

        let stats = ring.stats();
        assert_eq!(stats.read_offset, 0);
        assert_eq!(stats.lock_offset, 0);
        assert_eq!(stats.consumed, 32);
        assert!(stats.offsets_ordered());
        drop(handshake);
    }

    #[test]
    fn test_concurrent_producer_and_consumer() {
        let ring = Arc::new(RingBuffer::with_capacity(4096, 256));
        let stop = Arc::new(AtomicBool::new(false));

        let consumer = {
            let ring = ring.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut out = vec![0u8; 256];
                let mut delivered = 0usize;
                while !stop.load(Ordering::Acquire) {
                    delivered += ring.consume(&mut out);
                    // Every byte the producer writes is non-zero, silence is zero.
                    let data_bytes = out.iter().take_while(|&&b| b != 0).count();
                    assert!(out[data_bytes..].iter().all(|&b| b == 0));
                    assert!(ring.stats().offsets_ordered());
                    thread::yield_now();
                }
                delivered
            })
        };

        let mut played = 0usize;
        for _ in 0..2000 {
            let mut region = ring.begin_write();
            played += region.play_count();
            let chunk = vec![0x5Au8; region.len().min(1024)];
            let written = region.write(0, &chunk);
            ring.commit_write(region, written);
            thread::yield_now();
        }

        stop.store(true, Ordering::Release);
        let delivered = consumer.join().unwrap();
        assert!(played as u64 <= ring.stats().consumed);
        assert!(delivered as u64 <= ring.stats().consumed);
    }
}
