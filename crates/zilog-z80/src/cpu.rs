//! Z80 CPU core with instruction-level execution.
//!
//! `step()` runs one whole instruction (or one interrupt acknowledge) and
//! returns its T-state cost. Opcodes are decoded through fixed 256-entry
//! handler tables: one for unprefixed opcodes, one each for the CB and ED
//! pages, and one for the DDCB/FDCB form. DD and FD select an index mode and
//! re-dispatch through the unprefixed table, so each handler resolves HL, H,
//! L and (HL) against the active index register.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.

mod base;
mod cb;
mod ed;
mod index;

use emu_core::{Bus, Cpu};
use tracing::{debug, trace};

use crate::flags::{CF, PF, SF, ZF};
use crate::interrupt::{Interrupt, InterruptController, InterruptMode};
use crate::registers::{RegisterPair, Registers};

/// Opcode handler: receives the opcode byte it was dispatched on and
/// returns the instruction's T-state cost.
pub(crate) type Handler = fn(&mut Z80, &mut dyn Bus, u8) -> u32;

/// Which register stands in for HL in the instruction being executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum IndexMode {
    #[default]
    Hl,
    Ix,
    Iy,
}

/// Read-only copy of CPU state for debuggers and snapshot writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuSnapshot {
    pub regs: Registers,
    pub iff1: bool,
    pub iff2: bool,
    pub mode: InterruptMode,
    pub halted: bool,
}

/// Z80 CPU.
///
/// The CPU does not own the bus. The bus is passed to `step()` so it can be
/// shared with other components (e.g., the ULA) between instructions.
#[derive(Debug, Clone)]
pub struct Z80 {
    pub(crate) regs: Registers,
    pub(crate) irq: InterruptController,
    /// Set by a DD/FD prefix for the rest of the instruction.
    pub(crate) index: IndexMode,
    pub(crate) halted: bool,
    /// HALT came from the IM 0 data bus, not memory: PC already points at
    /// the instruction to resume.
    pub(crate) halted_in_place: bool,
    /// EI holds off maskable interrupts until after the next instruction.
    pub(crate) ei_shadow: bool,
    /// A prefix was executed on its own; no interrupt may split it from
    /// the opcode that follows.
    pub(crate) prefix_shadow: bool,
    /// Flags written by the current instruction, zero if none.
    pub(crate) q: u8,
    /// Q as left by the previous instruction. SCF and CCF read it.
    pub(crate) last_q: u8,
}

impl Z80 {
    /// Create a new Z80 in its power-on state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers::power_on(),
            irq: InterruptController::new(),
            index: IndexMode::Hl,
            halted: false,
            halted_in_place: false,
            ei_shadow: false,
            prefix_shadow: false,
            q: 0,
            last_q: 0,
        }
    }

    /// Execute one instruction, or acknowledge a pending interrupt, and
    /// return the T-states used.
    pub fn step(&mut self, bus: &mut dyn Bus) -> u32 {
        self.last_q = core::mem::take(&mut self.q);
        let after_prefix = core::mem::take(&mut self.prefix_shadow);
        let after_ei = core::mem::take(&mut self.ei_shadow);

        if !after_prefix {
            let request = if after_ei {
                self.irq
                    .take_nonmaskable()
                    .then_some(Interrupt::NonMaskable)
            } else {
                self.irq.poll_and_consume()
            };
            if let Some(request) = request {
                return self.acknowledge(bus, request);
            }
        }

        if self.halted {
            // HALT re-executes NOPs until an interrupt arrives.
            self.bump_r();
            return 4;
        }

        let opcode = self.fetch_opcode(bus);
        base::BASE[usize::from(opcode)](self, bus, opcode)
    }

    fn acknowledge(&mut self, bus: &mut dyn Bus, request: Interrupt) -> u32 {
        if self.halted {
            self.halted = false;
            if !core::mem::take(&mut self.halted_in_place) {
                self.regs.pc = self.regs.pc.wrapping_add(1);
            }
        }
        self.bump_r();

        match request {
            Interrupt::NonMaskable => {
                trace!(pc = self.regs.pc, "NMI acknowledged");
                self.push(bus, self.regs.pc);
                self.regs.pc = 0x0066;
                self.regs.wz = 0x0066;
                11
            }
            Interrupt::Maskable { data } => {
                trace!(pc = self.regs.pc, data, mode = self.irq.mode().number(), "interrupt acknowledged");
                match self.irq.mode() {
                    InterruptMode::Im0 => {
                        // The data byte is executed in place of a fetched
                        // opcode; PC is not advanced past it.
                        let cycles = base::BASE[usize::from(data)](self, bus, data) + 2;
                        if self.halted {
                            // HALT parks PC one back, expecting a fetch.
                            self.regs.pc = self.regs.pc.wrapping_add(1);
                            self.halted_in_place = true;
                        }
                        cycles
                    }
                    InterruptMode::Im1 => {
                        self.push(bus, self.regs.pc);
                        self.regs.pc = 0x0038;
                        self.regs.wz = 0x0038;
                        13
                    }
                    InterruptMode::Im2 => {
                        self.push(bus, self.regs.pc);
                        let vector = u16::from_be_bytes([self.regs.i, data]);
                        let target = self.read16(bus, vector);
                        self.regs.pc = target;
                        self.regs.wz = target;
                        19
                    }
                }
            }
        }
    }

    /// Whether the next `step` acknowledges an interrupt rather than
    /// executing the instruction at PC.
    #[must_use]
    pub fn will_acknowledge(&self) -> bool {
        if self.prefix_shadow {
            return false;
        }
        self.irq.pending_nonmaskable()
            || (!self.ei_shadow && self.irq.is_enabled() && self.irq.pending_maskable().is_some())
    }

    // === Accessors ===

    #[must_use]
    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    /// Mutable register access for loaders and test setup.
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[must_use]
    pub fn interrupts(&self) -> &InterruptController {
        &self.irq
    }

    /// The interrupt controller peripherals raise requests on.
    pub fn interrupts_mut(&mut self) -> &mut InterruptController {
        &mut self.irq
    }

    #[must_use]
    pub fn a(&self) -> u8 {
        self.regs.af.hi
    }

    #[must_use]
    pub fn f(&self) -> u8 {
        self.regs.af.lo
    }

    #[must_use]
    pub fn bc(&self) -> u16 {
        self.regs.bc.get()
    }

    #[must_use]
    pub fn de(&self) -> u16 {
        self.regs.de.get()
    }

    #[must_use]
    pub fn hl(&self) -> u16 {
        self.regs.hl.get()
    }

    #[must_use]
    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.regs.pc = pc;
    }

    pub fn set_sp(&mut self, sp: u16) {
        self.regs.sp = sp;
    }

    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs,
            iff1: self.irq.is_enabled(),
            iff2: self.irq.iff2(),
            mode: self.irq.mode(),
            halted: self.halted,
        }
    }

    /// Load registers and interrupt state. Pending requests are untouched.
    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.regs = snapshot.regs;
        self.irq.set_flip_flops(snapshot.iff1, snapshot.iff2);
        self.irq.set_mode(snapshot.mode);
        self.halted = snapshot.halted;
        self.halted_in_place = false;
        self.ei_shadow = false;
        self.prefix_shadow = false;
        self.index = IndexMode::Hl;
    }

    // === Fetch and memory helpers ===

    /// M1 fetch: read at PC, advance PC, refresh R.
    pub(crate) fn fetch_opcode(&mut self, bus: &mut dyn Bus) -> u8 {
        let opcode = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.bump_r();
        opcode
    }

    pub(crate) fn fetch8(&mut self, bus: &mut dyn Bus) -> u8 {
        let value = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    pub(crate) fn fetch16(&mut self, bus: &mut dyn Bus) -> u16 {
        let lo = self.fetch8(bus);
        let hi = self.fetch8(bus);
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn read16(&mut self, bus: &mut dyn Bus, address: u16) -> u16 {
        let lo = bus.read(address);
        let hi = bus.read(address.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub(crate) fn write16(&mut self, bus: &mut dyn Bus, address: u16, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        bus.write(address, lo);
        bus.write(address.wrapping_add(1), hi);
    }

    pub(crate) fn push(&mut self, bus: &mut dyn Bus, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, lo);
    }

    pub(crate) fn pop(&mut self, bus: &mut dyn Bus) -> u16 {
        let value = self.read16(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    /// R counts M1 cycles in its low 7 bits; bit 7 only changes via LD R,A.
    pub(crate) fn bump_r(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    // === Register helpers ===

    pub(crate) fn set_a(&mut self, value: u8) {
        self.regs.af.hi = value;
    }

    /// Write F and record it in Q.
    pub(crate) fn set_f(&mut self, flags: u8) {
        self.regs.af.lo = flags;
        self.q = flags;
    }

    fn pair(&self, mode: IndexMode) -> RegisterPair {
        match mode {
            IndexMode::Hl => self.regs.hl,
            IndexMode::Ix => self.regs.ix,
            IndexMode::Iy => self.regs.iy,
        }
    }

    fn pair_mut(&mut self, mode: IndexMode) -> &mut RegisterPair {
        match mode {
            IndexMode::Hl => &mut self.regs.hl,
            IndexMode::Ix => &mut self.regs.ix,
            IndexMode::Iy => &mut self.regs.iy,
        }
    }

    /// HL, or IX/IY under a prefix.
    pub(crate) fn hl_value(&self) -> u16 {
        self.pair(self.index).get()
    }

    pub(crate) fn set_hl_value(&mut self, value: u16) {
        self.pair_mut(self.index).set(value);
    }

    /// Register by 3-bit encoding. H and L follow the index prefix
    /// (undocumented IXH/IXL/IYH/IYL). Code 6 is memory and handled by the
    /// caller.
    pub(crate) fn reg8(&self, r: u8) -> u8 {
        self.reg8_in(r, self.index)
    }

    pub(crate) fn set_reg8(&mut self, r: u8, value: u8) {
        self.set_reg8_in(r, self.index, value);
    }

    /// Register by 3-bit encoding, always using the real H and L. Used
    /// where an instruction also has an `(IX+d)` operand.
    pub(crate) fn reg8_plain(&self, r: u8) -> u8 {
        self.reg8_in(r, IndexMode::Hl)
    }

    pub(crate) fn set_reg8_plain(&mut self, r: u8, value: u8) {
        self.set_reg8_in(r, IndexMode::Hl, value);
    }

    fn reg8_in(&self, r: u8, mode: IndexMode) -> u8 {
        match r & 7 {
            0 => self.regs.bc.hi,
            1 => self.regs.bc.lo,
            2 => self.regs.de.hi,
            3 => self.regs.de.lo,
            4 => self.pair(mode).hi,
            5 => self.pair(mode).lo,
            6 => 0,
            _ => self.regs.af.hi,
        }
    }

    fn set_reg8_in(&mut self, r: u8, mode: IndexMode, value: u8) {
        match r & 7 {
            0 => self.regs.bc.hi = value,
            1 => self.regs.bc.lo = value,
            2 => self.regs.de.hi = value,
            3 => self.regs.de.lo = value,
            4 => self.pair_mut(mode).hi = value,
            5 => self.pair_mut(mode).lo = value,
            6 => {}
            _ => self.regs.af.hi = value,
        }
    }

    /// Register pair by 2-bit encoding: BC DE HL SP.
    pub(crate) fn rr(&self, p: u8) -> u16 {
        match p & 3 {
            0 => self.regs.bc.get(),
            1 => self.regs.de.get(),
            2 => self.hl_value(),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn set_rr(&mut self, p: u8, value: u16) {
        match p & 3 {
            0 => self.regs.bc.set(value),
            1 => self.regs.de.set(value),
            2 => self.set_hl_value(value),
            _ => self.regs.sp = value,
        }
    }

    /// Register pair for PUSH/POP: BC DE HL AF.
    pub(crate) fn rr_af(&self, p: u8) -> u16 {
        if p & 3 == 3 {
            self.regs.af.get()
        } else {
            self.rr(p)
        }
    }

    pub(crate) fn set_rr_af(&mut self, p: u8, value: u16) {
        if p & 3 == 3 {
            self.regs.af.set(value);
        } else {
            self.set_rr(p, value);
        }
    }

    /// Address of the `(HL)` operand, or `(IX+d)`/`(IY+d)` under a prefix.
    /// The displaced form reads `d` from the instruction stream and leaves
    /// the address in WZ.
    pub(crate) fn operand_address(&mut self, bus: &mut dyn Bus) -> u16 {
        if self.index == IndexMode::Hl {
            return self.regs.hl.get();
        }
        let d = self.fetch8(bus) as i8;
        let address = self.hl_value().wrapping_add_signed(i16::from(d));
        self.regs.wz = address;
        address
    }

    /// Extra T-states for computing `IX+d` over plain `(HL)`.
    pub(crate) fn displacement_cost(&self) -> u32 {
        if self.index == IndexMode::Hl { 0 } else { 8 }
    }

    /// Condition code by 3-bit encoding: NZ Z NC C PO PE P M.
    pub(crate) fn condition(&self, cc: u8) -> bool {
        let f = self.regs.af.lo;
        match cc & 7 {
            0 => f & ZF == 0,
            1 => f & ZF != 0,
            2 => f & CF == 0,
            3 => f & CF != 0,
            4 => f & PF == 0,
            5 => f & PF != 0,
            6 => f & SF == 0,
            _ => f & SF != 0,
        }
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu for Z80 {
    type Registers = Registers;

    fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        Z80::step(self, bus)
    }

    fn pc(&self) -> u32 {
        u32::from(self.regs.pc)
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn is_halted(&self) -> bool {
        self.halted
    }

    fn interrupt(&mut self, data: u8) {
        self.irq.raise_maskable(data);
    }

    fn nmi(&mut self) {
        self.irq.raise_nonmaskable();
    }

    fn reset(&mut self) {
        debug!("Z80 reset");
        *self = Self::new();
    }
}
