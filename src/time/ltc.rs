//! LTC runtime state and the 80-bit LTC word codec
//!
//! [`LtcRuntime`] is the one structure in the crate written from a context
//! that can interrupt the poll loop. Everything the poll loop must see as a
//! unit (timecode fields, frame type and the "available" flag) lives in one
//! 32-bit word and is published with a single atomic store. The counters are
//! independent words with a single writer each.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use crate::core::{Error, Result};
use crate::util;
use super::timecode::{TimeCode, TimeCodeType};

/// Set in the published word while a frame has not been consumed
const AVAILABLE: u32 = 1 << 31;

/// Published word before the first frame; hours = 31 never unpacks
const UNSET: u32 = 0x7FFF_FFFF;

/// Period of the updates-per-second sample
pub const SAMPLE_PERIOD_MS: u32 = 1000;

/// Shared LTC decoder state, lifetime = power-on to power-off
#[derive(Debug)]
pub struct LtcRuntime {
    word: AtomicU32,
    updates: AtomicU32,
    updates_previous: AtomicU32,
    updates_per_second: AtomicU32,
    last_edge_ms: AtomicU32,
    last_sample_ms: AtomicU32,
    tc_type: AtomicU8,
}

static RUNTIME: LtcRuntime = LtcRuntime::new(TimeCodeType::Smpte);

/// The process-wide LTC runtime fed by the hardware edge handler
pub fn runtime() -> &'static LtcRuntime {
    &RUNTIME
}

impl LtcRuntime {
    pub const fn new(tc_type: TimeCodeType) -> Self {
        LtcRuntime {
            word: AtomicU32::new(UNSET),
            updates: AtomicU32::new(0),
            updates_previous: AtomicU32::new(0),
            updates_per_second: AtomicU32::new(0),
            last_edge_ms: AtomicU32::new(0),
            last_sample_ms: AtomicU32::new(0),
            tc_type: AtomicU8::new(tc_type.index()),
        }
    }

    /// Frame rate used to decode edges into frames
    pub fn set_timecode_type(&self, tc_type: TimeCodeType) {
        self.tc_type.store(tc_type.index(), Ordering::Relaxed);
    }

    pub fn timecode_type(&self) -> TimeCodeType {
        TimeCodeType::from_index(self.tc_type.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Producer path: one decoded frame edge
    ///
    /// Advances the published timecode by one frame of the configured type,
    /// starting from 00:00:00:00 when nothing of that type was published yet.
    pub fn record_edge(&self, timestamp_ms: u32) {
        let tc_type = self.timecode_type();
        let next = match TimeCode::from_packed(self.word.load(Ordering::Acquire)) {
            Ok(mut current) if current.tc_type() == tc_type => {
                current.add_frame();
                current
            }
            _ => TimeCode::zero(tc_type),
        };
        self.publish(timestamp_ms, next);
    }

    /// Producer path: a fully decoded LTC word
    pub fn record_timecode(&self, timestamp_ms: u32, timecode: TimeCode) {
        self.publish(timestamp_ms, timecode);
    }

    fn publish(&self, timestamp_ms: u32, timecode: TimeCode) {
        self.word.store(timecode.pack() | AVAILABLE, Ordering::Release);
        self.last_edge_ms.store(timestamp_ms, Ordering::Relaxed);
        self.updates.fetch_add(1, Ordering::Release);
    }

    /// Poll path: updates since the previous sample
    pub fn sample_rate(&self, now_ms: u32) -> u32 {
        let updates = self.updates.load(Ordering::Acquire);
        let previous = self.updates_previous.swap(updates, Ordering::Relaxed);
        let per_second = updates.wrapping_sub(previous);

        self.updates_per_second.store(per_second, Ordering::Relaxed);
        self.last_sample_ms.store(now_ms, Ordering::Relaxed);
        per_second
    }

    /// Busy-polled timer: samples the rate once per elapsed second
    pub fn run(&self, now_ms: u32) -> Option<u32> {
        let last = self.last_sample_ms.load(Ordering::Relaxed);
        if util::interval_elapsed(now_ms, last, SAMPLE_PERIOD_MS) {
            Some(self.sample_rate(now_ms))
        } else {
            None
        }
    }

    /// A frame was published and not yet taken
    pub fn available(&self) -> bool {
        self.word.load(Ordering::Acquire) & AVAILABLE != 0
    }

    /// Last published timecode, consumed or not
    pub fn current(&self) -> Option<TimeCode> {
        TimeCode::from_packed(self.word.load(Ordering::Acquire)).ok()
    }

    /// Returns the last published timecode if it was not taken yet
    pub fn take(&self) -> Option<TimeCode> {
        let word = self.word.fetch_and(!AVAILABLE, Ordering::AcqRel);
        if word & AVAILABLE == 0 {
            return None;
        }
        TimeCode::from_packed(word).ok()
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::Acquire)
    }

    pub fn updates_per_second(&self) -> u32 {
        self.updates_per_second.load(Ordering::Relaxed)
    }

    /// Measured rate minus the nominal rate of the configured type
    pub fn drift(&self) -> i32 {
        self.updates_per_second() as i32 - self.timecode_type().fps() as i32
    }

    /// No edge seen at all, or none within `timeout_ms`
    pub fn is_stale(&self, now_ms: u32, timeout_ms: u32) -> bool {
        self.updates() == 0
            || util::elapsed_ms(now_ms, self.last_edge_ms.load(Ordering::Relaxed)) > timeout_ms
    }
}

impl Default for LtcRuntime {
    fn default() -> Self {
        LtcRuntime::new(TimeCodeType::default())
    }
}

/// Size of an LTC frame in bytes
pub const LTC_WORD_SIZE: usize = 10;

/// SMPTE 12M sync word, bits 64..79 stored least significant bit first
const SYNC_WORD: [u8; 2] = [0xFC, 0xBF];

const DROP_FRAME_FLAG: u8 = 0x04;

/// 80-bit linear timecode frame
pub struct LtcWord;

impl LtcWord {
    /// Encodes the BCD fields, drop-frame flag and sync word; user bits are zero
    pub fn encode(timecode: &TimeCode) -> [u8; LTC_WORD_SIZE] {
        let mut word = [0u8; LTC_WORD_SIZE];
        word[0] = timecode.frames() % 10;
        word[1] = (timecode.frames() / 10) & 0x03;
        if timecode.tc_type().is_drop_frame() {
            word[1] |= DROP_FRAME_FLAG;
        }
        word[2] = timecode.seconds() % 10;
        word[3] = (timecode.seconds() / 10) & 0x07;
        word[4] = timecode.minutes() % 10;
        word[5] = (timecode.minutes() / 10) & 0x07;
        word[6] = timecode.hours() % 10;
        word[7] = (timecode.hours() / 10) & 0x03;
        word[8..].copy_from_slice(&SYNC_WORD);
        word
    }

    /// Decodes a frame; the drop-frame flag selects `DropFrame`, otherwise
    /// `fallback` names the rate the word cannot express
    pub fn decode(bytes: &[u8], fallback: TimeCodeType) -> Result<TimeCode> {
        if bytes.len() < LTC_WORD_SIZE {
            return Err(Error::Truncated { expected: LTC_WORD_SIZE, actual: bytes.len() });
        }
        if bytes[8..LTC_WORD_SIZE] != SYNC_WORD {
            return Err(Error::Malformed("ltc sync word"));
        }

        let bcd = |units: u8, tens: u8, tens_mask: u8| -> Result<u8> {
            let units = units & 0x0F;
            if units > 9 {
                return Err(Error::Malformed("ltc bcd digit"));
            }
            Ok((tens & tens_mask) * 10 + units)
        };

        let tc_type = if bytes[1] & DROP_FRAME_FLAG != 0 {
            TimeCodeType::DropFrame
        } else if fallback.is_drop_frame() {
            TimeCodeType::Smpte
        } else {
            fallback
        };

        TimeCode::new(
            bcd(bytes[6], bytes[7], 0x03)?,
            bcd(bytes[4], bytes[5], 0x07)?,
            bcd(bytes[2], bytes[3], 0x07)?,
            bcd(bytes[0], bytes[1], 0x03)?,
            tc_type,
        )
    }
}
