//! Timecode model, clocks and the LTC runtime
//!
//! - [`TimeCode`]: SMPTE hours:minutes:seconds:frames tagged with a
//!   [`TimeCodeType`], validated on construction
//! - [`Clock`]: the monotonic millisecond clock driving every software timer
//! - [`LtcRuntime`]: state shared between the LTC edge handler and the poll loop
//!
//! # Examples
//!
//! ```
//! use tcnet_ltc::time::{TimeCode, TimeCodeType};
//!
//! let mut tc = TimeCode::new(0, 0, 59, 29, TimeCodeType::DropFrame).unwrap();
//! tc.add_frame();
//! assert_eq!(tc.to_string(), "00:01:00:02");
//! ```

mod clock;
pub mod ltc;
mod timecode;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::ltc::{runtime, LtcRuntime, LtcWord, LTC_WORD_SIZE};
pub use self::timecode::{TimeCode, TimeCodeType, TIMECODE_TEXT_LENGTH};
