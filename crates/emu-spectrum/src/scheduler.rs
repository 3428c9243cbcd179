//! Frame pacing.
//!
//! A frame is a budget of CPU T-states. The scheduler steps the machine
//! until the budget is spent, then finalizes the frame's video and raises
//! the frame interrupt, once each. Instructions are never split, so a
//! frame usually overruns its budget by a few T-states.

use emu_core::Ticks;
use tracing::trace;

use crate::error::ConfigError;

/// What the scheduler drives.
pub trait FrameTarget {
    /// Run one instruction (or interrupt acknowledge) and return its cost.
    fn step(&mut self) -> u32;

    /// The frame numbered `frame` is complete.
    fn finalize_frame(&mut self, frame: u64);

    /// Assert the frame interrupt.
    fn raise_frame_interrupt(&mut self);

    /// De-assert the frame interrupt if it has not been taken yet.
    fn withdraw_frame_interrupt(&mut self);
}

/// Owns the cycle counter and the frame count.
#[derive(Debug, Clone)]
pub struct Scheduler {
    cycles_per_frame: u32,
    interrupt_hold: Option<u32>,
    cycles: Ticks,
    frame_count: u64,
    interrupt_raised: bool,
}

impl Scheduler {
    /// # Errors
    ///
    /// [`ConfigError::ZeroCyclesPerFrame`] if `cycles_per_frame` is 0.
    pub fn new(cycles_per_frame: u32) -> Result<Self, ConfigError> {
        if cycles_per_frame == 0 {
            return Err(ConfigError::ZeroCyclesPerFrame);
        }
        Ok(Self {
            cycles_per_frame,
            interrupt_hold: None,
            cycles: Ticks::ZERO,
            frame_count: 0,
            interrupt_raised: false,
        })
    }

    /// Withdraw the frame interrupt once `hold` T-states of the next frame
    /// have passed without it being taken.
    #[must_use]
    pub fn with_interrupt_hold(mut self, hold: Option<u32>) -> Self {
        self.interrupt_hold = hold;
        self
    }

    /// Run one frame and return the T-states it took.
    pub fn run_frame(&mut self, target: &mut impl FrameTarget) -> u64 {
        let budget = u64::from(self.cycles_per_frame);
        let hold = self.interrupt_hold.map(u64::from);
        let mut elapsed = 0;

        while elapsed < budget {
            if self.interrupt_raised && hold.is_some_and(|hold| elapsed >= hold) {
                target.withdraw_frame_interrupt();
                self.interrupt_raised = false;
            }
            elapsed += u64::from(target.step());
        }

        self.cycles += Ticks::new(elapsed);
        target.finalize_frame(self.frame_count);
        trace!(frame = self.frame_count, elapsed, "frame complete");
        self.frame_count += 1;
        target.raise_frame_interrupt();
        self.interrupt_raised = true;
        elapsed
    }

    /// Account for T-states spent outside [`run_frame`](Self::run_frame).
    pub fn advance(&mut self, cycles: u32) {
        self.cycles += Ticks::from(cycles);
    }

    /// Total T-states since power-on.
    #[must_use]
    pub fn cycles(&self) -> Ticks {
        self.cycles
    }

    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    #[must_use]
    pub fn interrupt_hold(&self) -> Option<u32> {
        self.interrupt_hold
    }
}
