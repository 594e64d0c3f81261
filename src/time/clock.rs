use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic millisecond clock sampled at the top of every poll step
///
/// The value wraps at `u32::MAX`; timers compare with wrapping arithmetic.
pub trait Clock {
    fn millis(&self) -> u32;
}

/// Clock backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u32 {
        // Truncation is the wrap
        self.origin.elapsed().as_millis() as u32
    }
}

/// Manually advanced clock for simulations and tests
///
/// Clones share the same time, so a test can keep a handle after giving one
/// to an engine.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u32>>,
}

impl ManualClock {
    pub fn new(start: u32) -> Self {
        ManualClock { now: Rc::new(Cell::new(start)) }
    }

    pub fn set(&self, millis: u32) {
        self.now.set(millis);
    }

    pub fn advance(&self, millis: u32) {
        self.now.set(self.now.get().wrapping_add(millis));
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u32 {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u32 {
        (**self).millis()
    }
}
