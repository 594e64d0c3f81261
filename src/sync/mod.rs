//! TCNet synchronisation
//!
//! This module holds the TCNet protocol engine, the reader that bridges
//! accepted timecode to MIDI timecode outputs, and the seams between them.

mod engine;
pub mod mtc;
mod reader;

pub use self::engine::{Engine, EngineStats};
pub use self::mtc::MidiTimeCode;
pub use self::reader::TcNetReader;

use crate::time::TimeCode;

/// Receiver of timecodes accepted by the engine
///
/// The engine holds its handler weakly; dropping the handler's last `Rc`
/// unregisters it.
pub trait TimeCodeHandler {
    fn handle_timecode(&mut self, timecode: &TimeCode);
}

/// Downstream output fed by the reader whenever the timecode changes
pub trait TimeCodeSink {
    fn send_timecode(&mut self, timecode: &MidiTimeCode);
}

impl<F: FnMut(&MidiTimeCode)> TimeCodeSink for F {
    fn send_timecode(&mut self, timecode: &MidiTimeCode) {
        self(timecode)
    }
}

/// Thread-local engine accessor for code that cannot take the engine as a
/// parameter
///
/// New code passes `&mut Engine` explicitly. One engine can be installed per
/// poll-loop thread.
pub mod legacy {
    use std::any::Any;
    use std::cell::RefCell;

    use tracing::debug;

    use super::Engine;
    use crate::core::{Error, Result};
    use crate::network::Transport;
    use crate::time::Clock;

    thread_local! {
        static ENGINE: RefCell<Option<Box<dyn Any>>> = RefCell::new(None);
    }

    /// Installs `engine` for this thread; fails if one is already installed
    pub fn install<T, C>(engine: Engine<T, C>) -> Result<()>
    where
        T: Transport + 'static,
        C: Clock + 'static,
    {
        ENGINE.with(|slot| {
            let mut slot = slot
                .try_borrow_mut()
                .map_err(|_| Error::invalid_state("Engine accessor in use"))?;
            if slot.is_some() {
                return Err(Error::invalid_state("An engine is already installed"));
            }
            *slot = Some(Box::new(engine));
            debug!("Engine installed");
            Ok(())
        })
    }

    /// Runs `f` with the installed engine
    ///
    /// Returns `None` when no engine of this type is installed or when called
    /// re-entrantly from inside `f`.
    pub fn with<T, C, R>(f: impl FnOnce(&mut Engine<T, C>) -> R) -> Option<R>
    where
        T: Transport + 'static,
        C: Clock + 'static,
    {
        ENGINE.with(|slot| {
            let mut slot = slot.try_borrow_mut().ok()?;
            let engine = slot.as_mut()?.downcast_mut::<Engine<T, C>>()?;
            Some(f(engine))
        })
    }

    /// Removes and returns the installed engine
    pub fn uninstall<T, C>() -> Option<Engine<T, C>>
    where
        T: Transport + 'static,
        C: Clock + 'static,
    {
        ENGINE.with(|slot| {
            let mut slot = slot.try_borrow_mut().ok()?;
            if !slot.as_ref()?.is::<Engine<T, C>>() {
                return None;
            }
            let engine = slot.take()?.downcast::<Engine<T, C>>().ok()?;
            debug!("Engine uninstalled");
            Some(*engine)
        })
    }

    pub fn is_installed() -> bool {
        ENGINE.with(|slot| slot.try_borrow().map(|slot| slot.is_some()).unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineConfig;
    use crate::network::MemoryTransport;
    use crate::time::{ManualClock, TimeCodeType};

    type TestEngine = Engine<MemoryTransport, ManualClock>;

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |mtc: &MidiTimeCode| seen.push(mtc.frames);
            let tc = TimeCode::new(0, 0, 0, 7, TimeCodeType::Ebu).unwrap();
            sink.send_timecode(&MidiTimeCode::from(&tc));
        }
        assert_eq!(seen, vec![7]);
    }

    #[test]
    fn test_legacy_accessor() {
        assert!(!legacy::is_installed());
        assert!(legacy::with(|engine: &mut TestEngine| engine.layer()).is_none());

        let engine = Engine::new(EngineConfig::default(), MemoryTransport::new(), ManualClock::new(0));
        legacy::install(engine).unwrap();
        assert!(legacy::is_installed());

        let second = Engine::new(EngineConfig::default(), MemoryTransport::new(), ManualClock::new(0));
        assert!(legacy::install(second).is_err());

        legacy::with(|engine: &mut TestEngine| engine.set_timecode_type(TimeCodeType::Film)).unwrap();
        let nested = legacy::with(|_: &mut TestEngine| legacy::with(|engine: &mut TestEngine| engine.layer()));
        assert_eq!(nested, Some(None));

        assert!(legacy::uninstall::<MemoryTransport, crate::time::SystemClock>().is_none());
        let engine: TestEngine = legacy::uninstall().unwrap();
        assert_eq!(engine.timecode_type(), TimeCodeType::Film);
        assert!(!legacy::is_installed());
    }
}
