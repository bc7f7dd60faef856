// crates/dinfox-rs/src/bus/reply.rs
//! Interrupt-fed reassembly of reply lines.
//!
//! [`ReplyRing`] is a single-producer/single-consumer ring of fixed-size line
//! slots. The producer is the receive interrupt (or a reader thread on a host)
//! calling [`ReplyRing::on_byte_received`]; the consumer is the foreground
//! reply-wait loop calling [`ReplyRing::take_next`]. When the consumer falls
//! behind, the oldest unread line is overwritten and counted in
//! [`ReplyRing::dropped_lines`].

use crate::types::{FRAME_END, FRAME_FIELD_INDEX_DATA, FRAME_FIELD_INDEX_SOURCE_ADDRESS};
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicUsize, Ordering};
use heapless::Vec;

/// Default number of line slots.
pub const REPLY_BUFFER_DEPTH: usize = 64;
/// Default size of one line slot, in bytes.
pub const REPLY_BUFFER_SIZE_BYTES: usize = 80;

// Slot ownership states.
const EMPTY: u8 = 0;
const FILLING: u8 = 1;
const READY: u8 = 2;
const READING: u8 = 3;

struct Slot<const LINE: usize> {
    state: AtomicU8,
    len: AtomicUsize,
    seq: AtomicU32,
    overflowed: AtomicBool,
    buffer: UnsafeCell<[u8; LINE]>,
}

impl<const LINE: usize> Slot<LINE> {
    const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            len: AtomicUsize::new(0),
            seq: AtomicU32::new(0),
            overflowed: AtomicBool::new(false),
            buffer: UnsafeCell::new([0; LINE]),
        }
    }
}

/// One reassembled line, copied out of the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyLine<const LINE: usize = REPLY_BUFFER_SIZE_BYTES> {
    bytes: Vec<u8, LINE>,
    overflowed: bool,
}

impl<const LINE: usize> ReplyLine<LINE> {
    /// Builds a line from raw bytes, truncating to the slot size.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut line = Vec::new();
        for byte in bytes.iter().take(LINE) {
            // Cannot fail: bounded by `take(LINE)`.
            let _ = line.push(*byte);
        }
        Self {
            bytes: line,
            overflowed: bytes.len() > LINE,
        }
    }

    /// The whole line, terminator excluded.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// True when the line was longer than the slot and wrapped onto itself.
    /// The content of such a line is corrupted.
    pub fn is_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Responder address of a multi-address frame.
    pub fn source_address(&self) -> Option<u8> {
        self.bytes.get(FRAME_FIELD_INDEX_SOURCE_ADDRESS).copied()
    }

    /// Payload of a multi-address frame (source address skipped).
    pub fn addressed_payload(&self) -> &[u8] {
        self.bytes.get(FRAME_FIELD_INDEX_DATA..).unwrap_or(&[])
    }
}

/// Lock-free SPSC ring of reply lines.
///
/// Slot buffers are only touched by the side that owns the slot state:
/// the producer while `FILLING`, the consumer while `READING`.
pub struct ReplyRing<const DEPTH: usize = REPLY_BUFFER_DEPTH, const LINE: usize = REPLY_BUFFER_SIZE_BYTES> {
    slots: [Slot<LINE>; DEPTH],
    /// Number of completed lines. The slot being filled is `produced % DEPTH`.
    produced: AtomicU32,
    dropped: AtomicU32,
    // Producer-only.
    offset: AtomicUsize,
    line_open: AtomicBool,
    discarding: AtomicBool,
    // Consumer-only.
    next: AtomicU32,
}

// SAFETY: slot buffers are only accessed by the side holding the slot's
// FILLING (producer) or READING (consumer) state, acquired through atomics.
unsafe impl<const DEPTH: usize, const LINE: usize> Sync for ReplyRing<DEPTH, LINE> {}

impl<const DEPTH: usize, const LINE: usize> Default for ReplyRing<DEPTH, LINE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEPTH: usize, const LINE: usize> ReplyRing<DEPTH, LINE> {
    pub const fn new() -> Self {
        Self {
            slots: [const { Slot::new() }; DEPTH],
            produced: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            offset: AtomicUsize::new(0),
            line_open: AtomicBool::new(false),
            discarding: AtomicBool::new(false),
            next: AtomicU32::new(0),
        }
    }

    fn current_slot(&self) -> &Slot<LINE> {
        let produced = self.produced.load(Ordering::Relaxed);
        &self.slots[produced as usize % DEPTH]
    }

    /// Claims the slot for a new line. A slot still holding an unread line
    /// is overwritten; a slot being read makes the whole line discarded.
    fn open_line(&self) {
        let slot = self.current_slot();
        self.offset.store(0, Ordering::Relaxed);
        self.line_open.store(true, Ordering::Relaxed);
        loop {
            match slot.state.compare_exchange(EMPTY, FILLING, Ordering::Acquire, Ordering::Relaxed) {
                Ok(_) => break,
                Err(READY) => {
                    if slot
                        .state
                        .compare_exchange(READY, FILLING, Ordering::Acquire, Ordering::Relaxed)
                        .is_ok()
                    {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    // Consumer claimed it in between, retry.
                }
                Err(READING) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    self.discarding.store(true, Ordering::Relaxed);
                    return;
                }
                Err(_) => break, // already FILLING: reopened after reset
            }
        }
        slot.overflowed.store(false, Ordering::Relaxed);
    }

    /// Producer entry point, called for every received byte.
    ///
    /// Never blocks and never allocates.
    pub fn on_byte_received(&self, byte: u8) {
        if !self.line_open.load(Ordering::Relaxed) {
            self.open_line();
        }
        if self.discarding.load(Ordering::Relaxed) {
            if byte == FRAME_END {
                self.discarding.store(false, Ordering::Relaxed);
                self.line_open.store(false, Ordering::Relaxed);
            }
            return;
        }
        let slot = self.current_slot();
        let offset = self.offset.load(Ordering::Relaxed);
        if byte == FRAME_END {
            let produced = self.produced.load(Ordering::Relaxed);
            slot.len.store(offset, Ordering::Relaxed);
            slot.seq.store(produced, Ordering::Relaxed);
            slot.state.store(READY, Ordering::Release);
            self.produced.store(produced.wrapping_add(1), Ordering::Release);
            self.line_open.store(false, Ordering::Relaxed);
            return;
        }
        // SAFETY: the slot is FILLING, owned by the producer.
        unsafe {
            (*slot.buffer.get())[offset] = byte;
        }
        let mut offset = offset + 1;
        if offset == LINE {
            offset = 0;
            slot.overflowed.store(true, Ordering::Relaxed);
        }
        self.offset.store(offset, Ordering::Relaxed);
    }

    /// Consumer side: yields the oldest unread line and releases its slot.
    pub fn take_next(&self) -> Option<ReplyLine<LINE>> {
        let produced = self.produced.load(Ordering::Acquire);
        let mut next = self.next.load(Ordering::Relaxed);
        // Lines older than the ring depth have been overwritten.
        if produced.wrapping_sub(next) > DEPTH as u32 {
            next = produced.wrapping_sub(DEPTH as u32);
        }
        while next != produced {
            let slot = &self.slots[next as usize % DEPTH];
            if slot
                .state
                .compare_exchange(READY, READING, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                if slot.seq.load(Ordering::Relaxed) == next {
                    let len = slot.len.load(Ordering::Relaxed).min(LINE);
                    // SAFETY: the slot is READING, owned by the consumer.
                    let bytes = unsafe { &(&(*slot.buffer.get()))[..len] };
                    let mut line = ReplyLine::from_bytes(bytes);
                    line.overflowed = slot.overflowed.load(Ordering::Relaxed);
                    slot.state.store(EMPTY, Ordering::Release);
                    self.next.store(next.wrapping_add(1), Ordering::Relaxed);
                    return Some(line);
                }
                // Holds a newer line; leave it for its turn.
                slot.state.store(READY, Ordering::Release);
            }
            // Sequence `next` was lost to an overwrite.
            next = next.wrapping_add(1);
        }
        self.next.store(next, Ordering::Relaxed);
        None
    }

    /// Clears every slot and counter except `dropped_lines`.
    ///
    /// Must only be called while the receiver is disabled.
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.state.store(EMPTY, Ordering::Relaxed);
            slot.len.store(0, Ordering::Relaxed);
            slot.overflowed.store(false, Ordering::Relaxed);
        }
        self.offset.store(0, Ordering::Relaxed);
        self.line_open.store(false, Ordering::Relaxed);
        self.discarding.store(false, Ordering::Relaxed);
        self.next.store(0, Ordering::Relaxed);
        self.produced.store(0, Ordering::Release);
    }

    /// Number of lines lost because the consumer fell behind.
    ///
    /// Usually the oldest unread line is the one lost. When the slot to
    /// overwrite is the one the consumer is copying out, the incoming line is
    /// discarded instead and counted here too.
    pub fn dropped_lines(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of completed lines not yet consumed.
    pub fn pending(&self) -> usize {
        let produced = self.produced.load(Ordering::Acquire);
        let next = self.next.load(Ordering::Relaxed);
        (produced.wrapping_sub(next) as usize).min(DEPTH)
    }
}
