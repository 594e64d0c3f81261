use crate::core::Result;
use crate::time::{TimeCode, TimeCodeType};

/// Status byte of a MIDI timecode quarter-frame message
pub const QUARTER_FRAME_STATUS: u8 = 0xF1;

/// Length of a full-frame SysEx message
pub const FULL_FRAME_LENGTH: usize = 10;

/// Timecode in the shape MIDI outputs consume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiTimeCode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub rate: TimeCodeType,
}

impl MidiTimeCode {
    /// Data bytes of the eight 0xF1 messages, piece number in the high nibble
    pub fn quarter_frames(&self) -> [u8; 8] {
        let nibbles = [
            self.frames & 0x0F,
            (self.frames >> 4) & 0x01,
            self.seconds & 0x0F,
            (self.seconds >> 4) & 0x03,
            self.minutes & 0x0F,
            (self.minutes >> 4) & 0x03,
            self.hours & 0x0F,
            (self.rate.index() << 1) | ((self.hours >> 4) & 0x01),
        ];

        let mut pieces = [0u8; 8];
        for (piece, (slot, nibble)) in pieces.iter_mut().zip(nibbles).enumerate() {
            *slot = ((piece as u8) << 4) | nibble;
        }
        pieces
    }

    /// Universal real-time SysEx full-frame message
    pub fn full_frame(&self) -> [u8; FULL_FRAME_LENGTH] {
        [
            0xF0,
            0x7F,
            0x7F,
            0x01,
            0x01,
            (self.rate.index() << 5) | (self.hours & 0x1F),
            self.minutes,
            self.seconds,
            self.frames,
            0xF7,
        ]
    }

    pub fn to_timecode(&self) -> Result<TimeCode> {
        TimeCode::new(self.hours, self.minutes, self.seconds, self.frames, self.rate)
    }
}

impl From<&TimeCode> for MidiTimeCode {
    fn from(tc: &TimeCode) -> Self {
        MidiTimeCode {
            hours: tc.hours(),
            minutes: tc.minutes(),
            seconds: tc.seconds(),
            frames: tc.frames(),
            rate: tc.tc_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_frames() {
        let tc = TimeCode::new(17, 42, 59, 29, TimeCodeType::Smpte).unwrap();
        let pieces = MidiTimeCode::from(&tc).quarter_frames();
        assert_eq!(pieces, [0x0D, 0x11, 0x2B, 0x33, 0x4A, 0x52, 0x61, 0x77]);
    }

    #[test]
    fn test_quarter_frames_rate_bits() {
        let tc = TimeCode::new(1, 0, 0, 0, TimeCodeType::Film).unwrap();
        assert_eq!(MidiTimeCode::from(&tc).quarter_frames()[7], 0x70);

        let tc = TimeCode::new(1, 0, 0, 0, TimeCodeType::DropFrame).unwrap();
        assert_eq!(MidiTimeCode::from(&tc).quarter_frames()[7], 0x74);
    }

    #[test]
    fn test_full_frame() {
        let tc = TimeCode::new(10, 20, 30, 12, TimeCodeType::Ebu).unwrap();
        let mtc = MidiTimeCode::from(&tc);
        assert_eq!(mtc.full_frame(), [0xF0, 0x7F, 0x7F, 0x01, 0x01, 0x2A, 20, 30, 12, 0xF7]);
        assert_eq!(mtc.to_timecode().unwrap(), tc);
    }
}
