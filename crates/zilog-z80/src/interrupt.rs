//! Interrupt request latches and mask state.
//!
//! Peripherals raise requests here; the CPU polls at instruction
//! boundaries. One maskable request can be pending at a time and a second
//! raise replaces its data byte. The non-maskable latch is separate and is
//! never merged with it.
//!
//! A maskable request stays latched across any number of steps with
//! interrupts disabled. It is cleared only by acknowledgement or by an
//! explicit [`InterruptController::withdraw_maskable`], which models a
//! peripheral releasing its line.

/// Maskable interrupt response selected by IM 0/1/2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterruptMode {
    /// Execute the data byte supplied by the peripheral as an opcode.
    #[default]
    Im0,
    /// Restart at 0x0038.
    Im1,
    /// Jump through the vector table entry at `I:data`.
    Im2,
}

impl InterruptMode {
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Im0 => 0,
            Self::Im1 => 1,
            Self::Im2 => 2,
        }
    }
}

/// An interrupt the CPU has committed to acknowledging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    NonMaskable,
    Maskable { data: u8 },
}

/// Pending requests plus IFF1/IFF2 and the interrupt mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterruptController {
    nmi_pending: bool,
    int_pending: Option<u8>,
    iff1: bool,
    iff2: bool,
    mode: InterruptMode,
}

impl InterruptController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert the maskable line with the byte the peripheral will put on
    /// the data bus during acknowledge. Last write wins.
    pub fn raise_maskable(&mut self, data: u8) {
        self.int_pending = Some(data);
    }

    /// Latch a non-maskable request.
    pub fn raise_nonmaskable(&mut self) {
        self.nmi_pending = true;
    }

    /// Release the maskable line without it being acknowledged.
    pub fn withdraw_maskable(&mut self) -> bool {
        self.int_pending.take().is_some()
    }

    /// DI/EI: set both flip-flops.
    pub fn set_mask(&mut self, enabled: bool) {
        self.iff1 = enabled;
        self.iff2 = enabled;
    }

    pub fn set_mode(&mut self, mode: InterruptMode) {
        self.mode = mode;
    }

    /// Take the next interrupt to acknowledge, if any, and update the mask
    /// the way the CPU does on acceptance.
    ///
    /// NMI wins over a maskable request and saves IFF1 in IFF2. A maskable
    /// request is only taken while IFF1 is set, and acceptance clears both
    /// flip-flops.
    pub fn poll_and_consume(&mut self) -> Option<Interrupt> {
        if self.take_nonmaskable() {
            return Some(Interrupt::NonMaskable);
        }
        if !self.iff1 {
            return None;
        }
        let data = self.int_pending.take()?;
        self.iff1 = false;
        self.iff2 = false;
        Some(Interrupt::Maskable { data })
    }

    /// Take only a pending NMI, leaving any maskable request latched. Used
    /// when maskable interrupts are held off for one instruction after EI.
    pub fn take_nonmaskable(&mut self) -> bool {
        if !core::mem::take(&mut self.nmi_pending) {
            return false;
        }
        self.iff2 = self.iff1;
        self.iff1 = false;
        true
    }

    /// RETN/RETI: IFF1 takes the value saved in IFF2.
    pub fn restore_iff1(&mut self) {
        self.iff1 = self.iff2;
    }

    /// Load both flip-flops directly (snapshot restore).
    pub fn set_flip_flops(&mut self, iff1: bool, iff2: bool) {
        self.iff1 = iff1;
        self.iff2 = iff2;
    }

    /// Clear latches and mask state, as on /RESET.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.iff1
    }

    #[must_use]
    pub fn iff2(&self) -> bool {
        self.iff2
    }

    #[must_use]
    pub fn mode(&self) -> InterruptMode {
        self.mode
    }

    #[must_use]
    pub fn pending_maskable(&self) -> Option<u8> {
        self.int_pending
    }

    #[must_use]
    pub fn pending_nonmaskable(&self) -> bool {
        self.nmi_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_request_stays_pending() {
        let mut irq = InterruptController::new();
        irq.raise_maskable(0xFF);
        assert_eq!(irq.poll_and_consume(), None);
        assert_eq!(irq.poll_and_consume(), None);
        assert_eq!(irq.pending_maskable(), Some(0xFF));

        irq.set_mask(true);
        assert_eq!(irq.poll_and_consume(), Some(Interrupt::Maskable { data: 0xFF }));
        assert!(!irq.is_enabled());
        assert!(!irq.iff2());
        assert_eq!(irq.poll_and_consume(), None);
    }

    #[test]
    fn last_raise_wins() {
        let mut irq = InterruptController::new();
        irq.set_mask(true);
        irq.raise_maskable(0x10);
        irq.raise_maskable(0x20);
        assert_eq!(irq.poll_and_consume(), Some(Interrupt::Maskable { data: 0x20 }));
    }

    #[test]
    fn nmi_preempts_and_keeps_maskable_latched() {
        let mut irq = InterruptController::new();
        irq.set_mask(true);
        irq.raise_maskable(0xFF);
        irq.raise_nonmaskable();

        assert_eq!(irq.poll_and_consume(), Some(Interrupt::NonMaskable));
        assert!(!irq.is_enabled());
        assert!(irq.iff2());
        assert_eq!(irq.pending_maskable(), Some(0xFF));

        irq.restore_iff1();
        assert_eq!(irq.poll_and_consume(), Some(Interrupt::Maskable { data: 0xFF }));
    }

    #[test]
    fn nmi_ignores_mask() {
        let mut irq = InterruptController::new();
        irq.raise_nonmaskable();
        assert_eq!(irq.poll_and_consume(), Some(Interrupt::NonMaskable));
        assert!(!irq.pending_nonmaskable());
    }

    #[test]
    fn mode_numbers_match_im_operand() {
        assert_eq!(InterruptMode::default().number(), 0);
        assert_eq!(InterruptMode::Im1.number(), 1);
        assert_eq!(InterruptMode::Im2.number(), 2);
    }

    #[test]
    fn withdraw_clears_maskable_only() {
        let mut irq = InterruptController::new();
        irq.raise_maskable(0xFF);
        irq.raise_nonmaskable();
        assert!(irq.withdraw_maskable());
        assert!(!irq.withdraw_maskable());
        assert!(irq.pending_nonmaskable());
    }
}
