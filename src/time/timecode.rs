use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Frame rate family of a timecode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeCodeType {
    /// 24 fps film
    Film,
    /// 25 fps EBU/PAL
    Ebu,
    /// 29.97 fps NTSC, drop-frame labels
    DropFrame,
    /// 30 fps non-drop
    Smpte,
}

impl TimeCodeType {
    pub const ALL: [TimeCodeType; 4] = [
        TimeCodeType::Film,
        TimeCodeType::Ebu,
        TimeCodeType::DropFrame,
        TimeCodeType::Smpte,
    ];

    /// Frame labels per second
    pub const fn fps(self) -> u8 {
        match self {
            TimeCodeType::Film => 24,
            TimeCodeType::Ebu => 25,
            TimeCodeType::DropFrame | TimeCodeType::Smpte => 30,
        }
    }

    /// Milliseconds per frame
    pub fn divider_ms(self) -> f32 {
        match self {
            TimeCodeType::Film => 1000.0 / 24.0,
            TimeCodeType::Ebu => 1000.0 / 25.0,
            TimeCodeType::DropFrame => 1000.0 / 29.97,
            TimeCodeType::Smpte => 1000.0 / 30.0,
        }
    }

    pub const fn is_drop_frame(self) -> bool {
        matches!(self, TimeCodeType::DropFrame)
    }

    /// Rate index shared by LTC and MIDI timecode (0 = 24 .. 3 = 30)
    pub const fn index(self) -> u8 {
        match self {
            TimeCodeType::Film => 0,
            TimeCodeType::Ebu => 1,
            TimeCodeType::DropFrame => 2,
            TimeCodeType::Smpte => 3,
        }
    }

    pub const fn from_index(index: u8) -> Option<TimeCodeType> {
        match index {
            0 => Some(TimeCodeType::Film),
            1 => Some(TimeCodeType::Ebu),
            2 => Some(TimeCodeType::DropFrame),
            3 => Some(TimeCodeType::Smpte),
            _ => None,
        }
    }

    /// SMPTE mode byte used by TCNet time messages
    pub const fn tcnet_code(self) -> u8 {
        match self {
            TimeCodeType::Film => 24,
            TimeCodeType::Ebu => 25,
            TimeCodeType::DropFrame => 29,
            TimeCodeType::Smpte => 30,
        }
    }

    pub const fn from_tcnet_code(code: u8) -> Option<TimeCodeType> {
        match code {
            24 => Some(TimeCodeType::Film),
            25 => Some(TimeCodeType::Ebu),
            29 => Some(TimeCodeType::DropFrame),
            30 => Some(TimeCodeType::Smpte),
            _ => None,
        }
    }

    /// Frames in a full day of labels
    pub const fn frames_per_day(self) -> u32 {
        match self {
            TimeCodeType::DropFrame => 24 * 6 * DF_FRAMES_PER_10_MINUTES,
            _ => 24 * 3600 * self.fps() as u32,
        }
    }
}

impl Default for TimeCodeType {
    fn default() -> Self {
        TimeCodeType::Smpte
    }
}

const DF_FRAMES_PER_MINUTE: u32 = 30 * 60 - 2;
const DF_FRAMES_PER_10_MINUTES: u32 = 10 * 30 * 60 - 9 * 2;

/// Length of the `HH:MM:SS:FF` text form
pub const TIMECODE_TEXT_LENGTH: usize = 11;

/// SMPTE timestamp tagged with its frame rate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeCode {
    hours: u8,
    minutes: u8,
    seconds: u8,
    frames: u8,
    tc_type: TimeCodeType,
}

impl TimeCode {
    /// Creates a validated timecode
    pub fn new(hours: u8, minutes: u8, seconds: u8, frames: u8, tc_type: TimeCodeType) -> Result<Self> {
        if hours >= 24 {
            return Err(Error::invalid_timecode("hours", hours));
        }
        if minutes >= 60 {
            return Err(Error::invalid_timecode("minutes", minutes));
        }
        if seconds >= 60 {
            return Err(Error::invalid_timecode("seconds", seconds));
        }
        if frames >= tc_type.fps() {
            return Err(Error::invalid_timecode("frames", frames));
        }
        // Labels 0 and 1 do not exist at the start of a dropped minute
        if tc_type.is_drop_frame() && seconds == 0 && frames < 2 && minutes % 10 != 0 {
            return Err(Error::invalid_timecode("frames", frames));
        }

        Ok(TimeCode { hours, minutes, seconds, frames, tc_type })
    }

    /// 00:00:00:00 for the given type
    pub const fn zero(tc_type: TimeCodeType) -> Self {
        TimeCode { hours: 0, minutes: 0, seconds: 0, frames: 0, tc_type }
    }

    pub const fn hours(&self) -> u8 {
        self.hours
    }

    pub const fn minutes(&self) -> u8 {
        self.minutes
    }

    pub const fn seconds(&self) -> u8 {
        self.seconds
    }

    pub const fn frames(&self) -> u8 {
        self.frames
    }

    pub const fn tc_type(&self) -> TimeCodeType {
        self.tc_type
    }

    /// Advances by one frame label
    ///
    /// Returns true when the timecode rolled over midnight back to 00:00:00:00.
    pub fn add_frame(&mut self) -> bool {
        self.frames += 1;
        if self.frames < self.tc_type.fps() {
            return false;
        }

        self.frames = 0;
        self.seconds += 1;
        if self.seconds < 60 {
            return false;
        }

        self.seconds = 0;
        self.minutes += 1;
        if self.minutes < 60 {
            if self.tc_type.is_drop_frame() && self.minutes % 10 != 0 {
                self.frames = 2;
            }
            return false;
        }

        self.minutes = 0;
        self.hours += 1;
        if self.hours < 24 {
            return false;
        }

        self.hours = 0;
        true
    }

    /// Number of frames since 00:00:00:00
    pub fn frame_count(&self) -> u32 {
        let seconds = self.hours as u32 * 3600 + self.minutes as u32 * 60 + self.seconds as u32;
        let nominal = seconds * self.tc_type.fps() as u32 + self.frames as u32;

        if self.tc_type.is_drop_frame() {
            let total_minutes = self.hours as u32 * 60 + self.minutes as u32;
            nominal - 2 * (total_minutes - total_minutes / 10)
        } else {
            nominal
        }
    }

    /// Builds the timecode of the `count`-th frame after midnight
    pub fn from_frame_count(count: u32, tc_type: TimeCodeType) -> Result<Self> {
        if count >= tc_type.frames_per_day() {
            return Err(Error::invalid_timecode("frame count", count));
        }

        let labels = if tc_type.is_drop_frame() {
            let tens = count / DF_FRAMES_PER_10_MINUTES;
            let rest = count % DF_FRAMES_PER_10_MINUTES;
            let skipped = if rest < 2 {
                18 * tens
            } else {
                18 * tens + 2 * ((rest - 2) / DF_FRAMES_PER_MINUTE)
            };
            count + skipped
        } else {
            count
        };

        let fps = tc_type.fps() as u32;
        let seconds = labels / fps;

        TimeCode::new(
            (seconds / 3600) as u8,
            (seconds / 60 % 60) as u8,
            (seconds % 60) as u8,
            (labels % fps) as u8,
            tc_type,
        )
    }

    /// Real time in milliseconds since midnight at which this frame starts
    ///
    /// Rounded up, so `from_millis(to_millis())` returns the same frame.
    pub fn to_millis(&self) -> u64 {
        let frames = self.frame_count() as u64;
        if self.tc_type.is_drop_frame() {
            (frames * 1001).div_ceil(30)
        } else {
            (frames * 1000).div_ceil(self.tc_type.fps() as u64)
        }
    }

    /// Timecode of the frame running at `millis` after midnight
    pub fn from_millis(millis: u64, tc_type: TimeCodeType) -> Result<Self> {
        let frames = if tc_type.is_drop_frame() {
            millis * 30 / 1001
        } else {
            millis * tc_type.fps() as u64 / 1000
        };
        let frames = u32::try_from(frames).map_err(|_| Error::invalid_timecode("frame count", u32::MAX))?;
        TimeCode::from_frame_count(frames, tc_type)
    }

    /// Signed milliseconds from `reference` to `self`
    pub fn elapsed_millis_since(&self, reference: &TimeCode) -> Result<i64> {
        if self.tc_type != reference.tc_type {
            return Err(Error::invalid_timecode("type", reference.tc_type.index()));
        }
        Ok(self.to_millis() as i64 - reference.to_millis() as i64)
    }

    /// Renders `HH:MM:SS:FF` without allocating
    pub fn to_text(&self) -> [u8; TIMECODE_TEXT_LENGTH] {
        let mut text = *b"00:00:00:00";
        for (i, value) in [self.hours, self.minutes, self.seconds, self.frames].into_iter().enumerate() {
            text[i * 3] = b'0' + value / 10;
            text[i * 3 + 1] = b'0' + value % 10;
        }
        text
    }

    /// Parses `HH:MM:SS:FF`; `;` is accepted before the frames
    pub fn parse(text: &str, tc_type: TimeCodeType) -> Result<Self> {
        let bytes = text.trim().as_bytes();
        if bytes.len() != TIMECODE_TEXT_LENGTH {
            return Err(Error::Malformed("timecode text length"));
        }

        let mut fields = [0u8; 4];
        for (i, field) in fields.iter_mut().enumerate() {
            let (tens, units) = (bytes[i * 3], bytes[i * 3 + 1]);
            if !tens.is_ascii_digit() || !units.is_ascii_digit() {
                return Err(Error::Malformed("timecode text digits"));
            }
            *field = (tens - b'0') * 10 + (units - b'0');

            if i < 3 {
                let separator = bytes[i * 3 + 2];
                if separator != b':' && !(i == 2 && separator == b';') {
                    return Err(Error::Malformed("timecode text separator"));
                }
            }
        }

        TimeCode::new(fields[0], fields[1], fields[2], fields[3], tc_type)
    }

    /// Packs into one 32-bit word: frames, seconds, minutes, hours bytes with
    /// the type index in bits 29..31. Bit 31 stays clear.
    pub const fn pack(&self) -> u32 {
        self.frames as u32
            | (self.seconds as u32) << 8
            | (self.minutes as u32) << 16
            | (self.hours as u32) << 24
            | (self.tc_type.index() as u32) << 29
    }

    /// Inverse of [`TimeCode::pack`]; bit 31 is ignored
    pub fn from_packed(word: u32) -> Result<Self> {
        let index = ((word >> 29) & 0x03) as u8;
        let tc_type = TimeCodeType::from_index(index).ok_or(Error::invalid_timecode("type", index))?;
        TimeCode::new(
            ((word >> 24) & 0x1F) as u8,
            ((word >> 16) & 0x3F) as u8,
            ((word >> 8) & 0x3F) as u8,
            (word & 0x1F) as u8,
            tc_type,
        )
    }

    /// Timecode for a wall-clock time of day
    pub fn from_naive_time(time: NaiveTime, tc_type: TimeCodeType) -> Self {
        let fps = tc_type.fps() as u64;
        // Leap seconds report nanoseconds above one second
        let nanos = (time.nanosecond() as u64).min(999_999_999);
        let mut frames = (nanos * fps / 1_000_000_000) as u8;
        let minutes = time.minute() as u8;
        let seconds = time.second().min(59) as u8;

        if tc_type.is_drop_frame() && seconds == 0 && frames < 2 && minutes % 10 != 0 {
            frames = 2;
        }

        TimeCode {
            hours: time.hour() as u8,
            minutes,
            seconds,
            frames,
            tc_type,
        }
    }
}

impl Default for TimeCode {
    fn default() -> Self {
        TimeCode::zero(TimeCodeType::default())
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tc(h: u8, m: u8, s: u8, f: u8, t: TimeCodeType) -> TimeCode {
        TimeCode::new(h, m, s, f, t).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_fields() {
        assert!(TimeCode::new(24, 0, 0, 0, TimeCodeType::Smpte).is_err());
        assert!(TimeCode::new(0, 60, 0, 0, TimeCodeType::Smpte).is_err());
        assert!(TimeCode::new(0, 0, 60, 0, TimeCodeType::Smpte).is_err());
        assert!(TimeCode::new(0, 0, 0, 24, TimeCodeType::Film).is_err());
        assert!(TimeCode::new(0, 0, 0, 25, TimeCodeType::Ebu).is_err());
        assert!(TimeCode::new(0, 0, 0, 30, TimeCodeType::Smpte).is_err());
        assert!(TimeCode::new(0, 0, 0, 24, TimeCodeType::Ebu).is_ok());

        match TimeCode::new(0, 0, 0, 30, TimeCodeType::Ebu) {
            Err(Error::InvalidTimeCode { field, value }) => {
                assert_eq!(field, "frames");
                assert_eq!(value, 30);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_drop_frame_labels_rejected() {
        assert!(TimeCode::new(0, 1, 0, 0, TimeCodeType::DropFrame).is_err());
        assert!(TimeCode::new(0, 1, 0, 1, TimeCodeType::DropFrame).is_err());
        assert!(TimeCode::new(0, 1, 0, 2, TimeCodeType::DropFrame).is_ok());
        assert!(TimeCode::new(0, 10, 0, 0, TimeCodeType::DropFrame).is_ok());
        assert!(TimeCode::new(0, 1, 0, 0, TimeCodeType::Smpte).is_ok());
    }

    #[test]
    fn test_fps_frames_advance_one_second() {
        for tc_type in TimeCodeType::ALL {
            let start = tc(1, 2, 3, 4, tc_type);
            let mut current = start;
            for _ in 0..tc_type.fps() {
                assert!(!current.add_frame());
            }
            assert_eq!(current, tc(1, 2, 4, 4, tc_type));
        }
    }

    #[test]
    fn test_minute_and_hour_rollover() {
        let mut current = tc(0, 59, 59, 24, TimeCodeType::Ebu);
        current.add_frame();
        assert_eq!(current, tc(1, 0, 0, 0, TimeCodeType::Ebu));

        let mut current = tc(5, 3, 59, 23, TimeCodeType::Film);
        current.add_frame();
        assert_eq!(current, tc(5, 4, 0, 0, TimeCodeType::Film));
    }

    #[test]
    fn test_day_wrap_is_reported() {
        let mut current = tc(23, 59, 59, 29, TimeCodeType::Smpte);
        assert!(current.add_frame());
        assert_eq!(current, TimeCode::zero(TimeCodeType::Smpte));
    }

    #[test]
    fn test_drop_frame_skips_at_minute_boundaries() {
        let mut current = tc(0, 0, 59, 29, TimeCodeType::DropFrame);
        current.add_frame();
        assert_eq!(current, tc(0, 1, 0, 2, TimeCodeType::DropFrame));

        let mut current = tc(0, 9, 59, 29, TimeCodeType::DropFrame);
        current.add_frame();
        assert_eq!(current, tc(0, 10, 0, 0, TimeCodeType::DropFrame));

        let mut current = tc(0, 59, 59, 29, TimeCodeType::DropFrame);
        current.add_frame();
        assert_eq!(current, tc(1, 0, 0, 0, TimeCodeType::DropFrame));
    }

    #[test]
    fn test_drop_frame_count_is_contiguous() {
        let mut current = TimeCode::zero(TimeCodeType::DropFrame);
        for expected in 0..DF_FRAMES_PER_10_MINUTES + 100 {
            assert_eq!(current.frame_count(), expected, "at {}", current);
            assert_eq!(TimeCode::from_frame_count(expected, TimeCodeType::DropFrame).unwrap(), current);
            current.add_frame();
        }
        assert_eq!(tc(0, 10, 0, 0, TimeCodeType::DropFrame).frame_count(), 17982);
        assert_eq!(tc(1, 0, 0, 0, TimeCodeType::DropFrame).frame_count(), 107_892);
    }

    #[test]
    fn test_millis_conversion() {
        assert_eq!(tc(0, 0, 1, 12, TimeCodeType::Ebu).to_millis(), 1480);
        assert_eq!(tc(1, 0, 0, 0, TimeCodeType::Smpte).to_millis(), 3_600_000);
        assert_eq!(tc(0, 1, 0, 2, TimeCodeType::DropFrame).to_millis(), 60_060);

        assert_eq!(TimeCode::from_millis(1480, TimeCodeType::Ebu).unwrap(), tc(0, 0, 1, 12, TimeCodeType::Ebu));
        assert_eq!(TimeCode::from_millis(3_723_999, TimeCodeType::Film).unwrap(), tc(1, 2, 3, 23, TimeCodeType::Film));
        assert!(TimeCode::from_millis(24 * 3_600_000, TimeCodeType::Smpte).is_err());

        let film = tc(0, 0, 2, 10, TimeCodeType::Film);
        assert_eq!(film.to_millis(), 2417);
        assert_eq!(TimeCode::from_millis(film.to_millis(), TimeCodeType::Film).unwrap(), film);
    }

    #[test]
    fn test_elapsed_millis() {
        let reference = tc(0, 0, 10, 0, TimeCodeType::Ebu);
        let later = tc(0, 0, 12, 5, TimeCodeType::Ebu);
        assert_eq!(later.elapsed_millis_since(&reference).unwrap(), 2200);
        assert_eq!(reference.elapsed_millis_since(&later).unwrap(), -2200);
        assert!(later.elapsed_millis_since(&TimeCode::zero(TimeCodeType::Film)).is_err());
    }

    #[test]
    fn test_divider_is_derived_from_type() {
        assert!((TimeCodeType::Ebu.divider_ms() - 40.0).abs() < f32::EPSILON);
        assert!(TimeCodeType::DropFrame.divider_ms() > TimeCodeType::Smpte.divider_ms());
    }

    #[test]
    fn test_text_form() {
        let value = tc(9, 8, 7, 6, TimeCodeType::Film);
        assert_eq!(value.to_string(), "09:08:07:06");
        assert_eq!(&value.to_text(), b"09:08:07:06");
        assert_eq!(TimeCode::parse("09:08:07:06", TimeCodeType::Film).unwrap(), value);
        assert_eq!(
            TimeCode::parse("00:01:00;02", TimeCodeType::DropFrame).unwrap(),
            tc(0, 1, 0, 2, TimeCodeType::DropFrame)
        );

        assert!(TimeCode::parse("9:08:07:06", TimeCodeType::Film).is_err());
        assert!(TimeCode::parse("09-08-07-06", TimeCodeType::Film).is_err());
        assert!(TimeCode::parse("09:08:07:24", TimeCodeType::Film).is_err());
    }

    #[test]
    fn test_packed_word() {
        let value = tc(23, 59, 58, 29, TimeCodeType::DropFrame);
        let word = value.pack();
        assert_eq!(word & 0x8000_0000, 0);
        assert_eq!(TimeCode::from_packed(word).unwrap(), value);
        assert_eq!(TimeCode::from_packed(word | 0x8000_0000).unwrap(), value);
        assert!(TimeCode::from_packed(0x0000_001E | (1 << 29)).is_err());
    }

    #[test]
    fn test_from_naive_time() {
        let time = NaiveTime::from_hms_milli_opt(12, 34, 56, 500).unwrap();
        assert_eq!(TimeCode::from_naive_time(time, TimeCodeType::Ebu), tc(12, 34, 56, 12, TimeCodeType::Ebu));

        let time = NaiveTime::from_hms_milli_opt(0, 1, 0, 10).unwrap();
        assert_eq!(
            TimeCode::from_naive_time(time, TimeCodeType::DropFrame),
            tc(0, 1, 0, 2, TimeCodeType::DropFrame)
        );
    }
}
