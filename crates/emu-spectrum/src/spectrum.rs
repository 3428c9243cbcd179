//! Top-level Spectrum system.
//!
//! # Frame loop
//!
//! `run_frame()` applies queued input, steps the CPU until one frame's worth
//! of T-states (69,888 for 48K PAL) has elapsed, hands video memory to the
//! frame sink and raises the ULA's frame interrupt. The interrupt is taken
//! at the start of the next frame, once the running program allows it.

use emu_core::{Cpu, Ticks};
use tracing::debug;
use zilog_z80::{CpuSnapshot, Z80};

use crate::bus::SpectrumBus;
use crate::config::SpectrumConfig;
use crate::error::{ConfigError, MemoryError};
use crate::input::{InputQueue, SpectrumKey};
use crate::io::{IoSpace, IoSpaceBuilder};
use crate::memory::AddressSpace;
use crate::scheduler::{FrameTarget, Scheduler};
use crate::ula::{ULA_DECODE, Ula};
use crate::video::{Frame, FrameSink, ScreenRenderer};

/// Callback run when execution reaches a trapped address.
pub type TrapHandler = Box<dyn FnMut(&mut Z80, &mut SpectrumBus) + Send>;

struct Trap {
    addr: u16,
    handler: TrapHandler,
}

/// Machine state outside the CPU registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MachineSnapshot {
    pub cpu: CpuSnapshot,
    pub cycles: Ticks,
    pub frame_count: u64,
    pub border: u8,
}

/// Everything the scheduler steps.
struct Hardware<S> {
    cpu: Z80,
    bus: SpectrumBus,
    sink: S,
    traps: Vec<Trap>,
    interrupt_data: u8,
}

impl<S: FrameSink> Hardware<S> {
    fn border(&self) -> u8 {
        self.bus.io.handler::<Ula>().map_or(7, Ula::border)
    }
}

impl<S: FrameSink> FrameTarget for Hardware<S> {
    fn step(&mut self) -> u32 {
        // Idle HALT steps and interrupt acknowledges execute nothing at PC.
        if self.cpu.is_halted() || self.cpu.will_acknowledge() {
            return self.cpu.step(&mut self.bus);
        }
        let pc = self.cpu.regs().pc;
        for trap in self.traps.iter_mut().filter(|trap| trap.addr == pc) {
            (trap.handler)(&mut self.cpu, &mut self.bus);
        }
        self.cpu.step(&mut self.bus)
    }

    fn finalize_frame(&mut self, frame: u64) {
        let border = self.border();
        self.sink.finalize_frame(&Frame {
            number: frame,
            border,
            video_ram: self.bus.memory.video_ram(),
        });
    }

    fn raise_frame_interrupt(&mut self) {
        self.cpu.interrupt(self.interrupt_data);
    }

    fn withdraw_frame_interrupt(&mut self) {
        self.cpu.interrupts_mut().withdraw_maskable();
    }
}

/// ZX Spectrum system.
pub struct Spectrum<S: FrameSink = ScreenRenderer> {
    hw: Hardware<S>,
    scheduler: Scheduler,
    input_queue: InputQueue,
    start_address: u16,
}

impl Spectrum {
    /// Build a machine that renders into a [`ScreenRenderer`].
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from validating `config`.
    pub fn new(config: &SpectrumConfig) -> Result<Self, ConfigError> {
        Self::with_sink(config, ScreenRenderer::new())
    }
}

impl<S: FrameSink> Spectrum<S> {
    /// Build a machine that hands each frame to `sink`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from validating `config`.
    pub fn with_sink(config: &SpectrumConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut memory = AddressSpace::new(&config.model.memory_map())?;
        memory
            .load(0x0000, &config.rom)
            .map_err(|_| ConfigError::RomSize {
                expected: config.model.rom_size(),
                actual: config.rom.len(),
            })?;
        let io = IoSpaceBuilder::new().register(ULA_DECODE, Ula::default()).build();

        let scheduler =
            Scheduler::new(config.cycles_per_frame)?.with_interrupt_hold(config.interrupt_hold);

        let mut cpu = Z80::new();
        cpu.set_pc(config.start_address);

        debug!(
            model = ?config.model,
            cycles_per_frame = config.cycles_per_frame,
            interrupt_hold = ?config.interrupt_hold,
            "spectrum created"
        );

        Ok(Self {
            hw: Hardware {
                cpu,
                bus: SpectrumBus::new(memory, io),
                sink,
                traps: Vec::new(),
                interrupt_data: config.interrupt_data,
            },
            scheduler,
            input_queue: InputQueue::new(),
            start_address: config.start_address,
        })
    }

    /// Execute one instruction outside the frame loop. Returns its T-states.
    pub fn step(&mut self) -> u32 {
        let cycles = self.hw.step();
        self.scheduler.advance(cycles);
        cycles
    }

    /// Run one complete frame and return the T-states it took.
    pub fn run_frame(&mut self) -> u64 {
        let frame = self.scheduler.frame_count();
        if let Some(ula) = self.hw.bus.io.handler_mut::<Ula>() {
            self.input_queue.process(frame, ula.keyboard_mut());
        }
        self.scheduler.run_frame(&mut self.hw)
    }

    /// Copy a raw image into memory, ROM included.
    ///
    /// # Errors
    ///
    /// [`MemoryError::ImageTooLarge`] if it would run past $FFFF.
    pub fn load(&mut self, base: u16, image: &[u8]) -> Result<(), MemoryError> {
        self.hw.bus.memory.load(base, image)
    }

    /// Reset the CPU and resume from the configured start address. Memory,
    /// peripherals and the cycle counter are left alone.
    pub fn reset(&mut self) {
        self.hw.cpu.reset();
        self.hw.cpu.set_pc(self.start_address);
    }

    /// Run `handler` each time execution reaches `addr`, before the
    /// instruction there. A HALT at `addr` triggers once, not on every idle
    /// step, and a step that acknowledges an interrupt triggers nothing.
    pub fn add_trap(
        &mut self,
        addr: u16,
        handler: impl FnMut(&mut Z80, &mut SpectrumBus) + Send + 'static,
    ) {
        self.hw.traps.push(Trap {
            addr,
            handler: Box::new(handler),
        });
    }

    pub fn remove_traps(&mut self, addr: u16) {
        self.hw.traps.retain(|trap| trap.addr != addr);
    }

    #[must_use]
    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            cpu: self.hw.cpu.snapshot(),
            cycles: self.scheduler.cycles(),
            frame_count: self.scheduler.frame_count(),
            border: self.hw.border(),
        }
    }

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.hw.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.hw.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.hw.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.hw.bus
    }

    #[must_use]
    pub fn io(&self) -> &IoSpace {
        &self.hw.bus.io
    }

    pub fn io_mut(&mut self) -> &mut IoSpace {
        &mut self.hw.bus.io
    }

    /// The ULA registered on port $FE.
    #[must_use]
    pub fn ula(&self) -> Option<&Ula> {
        self.hw.bus.io.handler::<Ula>()
    }

    pub fn ula_mut(&mut self) -> Option<&mut Ula> {
        self.hw.bus.io.handler_mut::<Ula>()
    }

    /// Total T-states since power-on.
    #[must_use]
    pub fn cycles(&self) -> Ticks {
        self.scheduler.cycles()
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.scheduler.frame_count()
    }

    #[must_use]
    pub fn frame_sink(&self) -> &S {
        &self.hw.sink
    }

    pub fn frame_sink_mut(&mut self) -> &mut S {
        &mut self.hw.sink
    }

    /// Timed key events, applied at the start of each frame.
    pub fn input_queue(&mut self) -> &mut InputQueue {
        &mut self.input_queue
    }

    /// Press a key immediately; it stays down until released.
    pub fn press_key(&mut self, key: SpectrumKey) {
        if let Some(ula) = self.ula_mut() {
            ula.keyboard_mut().press(key);
        }
    }

    pub fn release_key(&mut self, key: SpectrumKey) {
        if let Some(ula) = self.ula_mut() {
            ula.keyboard_mut().release(key);
        }
    }

    pub fn release_all_keys(&mut self) {
        if let Some(ula) = self.ula_mut() {
            ula.keyboard_mut().release_all();
        }
    }

    /// Drive the EAR input from a tape signal, or `None` to disconnect.
    pub fn set_ear(&mut self, level: Option<bool>) {
        if let Some(ula) = self.ula_mut() {
            ula.set_ear(level);
        }
    }

    /// Request a non-maskable interrupt.
    pub fn nmi(&mut self) {
        self.hw.cpu.nmi();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrumModel;
    use crate::keyboard::KeyboardMatrix;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn make_spectrum(program: &[u8]) -> Spectrum {
        let mut rom = vec![0u8; 0x4000];
        rom[..program.len()].copy_from_slice(program);
        Spectrum::new(&SpectrumConfig::new(SpectrumModel::Spectrum48K, rom)).expect("valid config")
    }

    #[test]
    fn rejects_bad_rom() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![0; 10]);
        assert!(matches!(Spectrum::new(&config), Err(ConfigError::RomSize { .. })));
    }

    #[test]
    fn run_frame_returns_tstate_count() {
        // DI; HALT
        let mut machine = make_spectrum(&[0xF3, 0x76]);
        let tstates = machine.run_frame();
        assert!((69_888..69_892).contains(&tstates), "got {tstates}");
        assert_eq!(machine.cycles().get(), tstates);
        assert_eq!(machine.frame_count(), 1);
        assert_eq!(machine.frame_sink().frames_rendered(), 1);
    }

    #[test]
    fn frame_interrupt_is_raised_with_configured_data() {
        let mut machine = make_spectrum(&[0xF3, 0x76]);
        machine.run_frame();
        assert_eq!(machine.cpu().interrupts().pending_maskable(), Some(0xFF));
    }

    #[test]
    fn step_advances_cycle_counter() {
        let mut machine = make_spectrum(&[0x00, 0x00]);
        assert_eq!(machine.step(), 4);
        assert_eq!(machine.step(), 4);
        assert_eq!(machine.cycles().get(), 8);
        assert_eq!(machine.cpu().regs().pc, 2);
    }

    #[test]
    fn reset_returns_to_start_address() {
        let mut rom = vec![0u8; 0x4000];
        rom[0x100] = 0x76;
        let mut config = SpectrumConfig::new(SpectrumModel::Spectrum48K, rom);
        config.start_address = 0x0100;
        let mut machine = Spectrum::new(&config).expect("valid config");
        assert_eq!(machine.cpu().regs().pc, 0x0100);

        machine.step();
        machine.reset();
        assert_eq!(machine.cpu().regs().pc, 0x0100);
        assert!(!machine.cpu().interrupts().is_enabled());
        assert_eq!(machine.cycles().get(), 4);
    }

    #[test]
    fn trap_runs_before_instruction() {
        // CALL 0010h; HALT. The trap returns immediately with A doubled.
        let mut machine = make_spectrum(&[0xCD, 0x10, 0x00, 0x76]);
        machine.cpu_mut().regs_mut().af.hi = 21;
        machine.cpu_mut().set_sp(0x8000);
        machine.add_trap(0x0010, |cpu, bus| {
            let regs = cpu.regs_mut();
            regs.af.hi = regs.af.hi.wrapping_mul(2);
            let sp = regs.sp;
            let ret = u16::from_le_bytes([bus.memory.read(sp), bus.memory.read(sp.wrapping_add(1))]);
            regs.sp = sp.wrapping_add(2);
            regs.pc = ret;
        });

        machine.step(); // CALL
        machine.step(); // trap, then HALT at 0003
        assert_eq!(machine.cpu().a(), 42);
        assert!(machine.cpu().is_halted());
        assert_eq!(machine.cpu().regs().pc, 0x0003);

        machine.remove_traps(0x0010);
        assert!(machine.hw.traps.is_empty());
    }

    fn counting_trap(machine: &mut Spectrum, addr: u16) -> Arc<AtomicU32> {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        machine.add_trap(addr, move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        hits
    }

    #[test]
    fn trap_on_halt_fires_once_per_arrival() {
        // DI; HALT
        let mut machine = make_spectrum(&[0xF3, 0x76]);
        let hits = counting_trap(&mut machine, 0x0001);
        machine.run_frame();
        machine.run_frame();
        assert!(machine.cpu().is_halted());
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn trap_skips_interrupt_acknowledge() {
        // IM 1; EI; NOP; NOP; NOP; HALT. The handler at 0038h is EI; RET.
        let mut program = vec![0u8; 0x3A];
        program[..8].copy_from_slice(&[0xED, 0x56, 0xFB, 0x00, 0x00, 0x00, 0x76, 0x00]);
        program[0x38..].copy_from_slice(&[0xFB, 0xC9]);
        let mut machine = make_spectrum(&program);
        machine.cpu_mut().set_sp(0x8000);
        let hits = counting_trap(&mut machine, 0x0004);

        machine.step(); // IM 1
        machine.step(); // EI
        machine.step(); // NOP
        assert_eq!(machine.cpu().regs().pc, 0x0004);
        machine.cpu_mut().interrupt(0xFF);

        assert_eq!(machine.step(), 13);
        assert_eq!(machine.cpu().regs().pc, 0x0038);
        assert_eq!(hits.load(Ordering::Relaxed), 0);

        machine.step(); // EI
        machine.step(); // RET
        assert_eq!(machine.cpu().regs().pc, 0x0004);
        machine.step(); // NOP at the trap address
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn key_presses_reach_the_ula() {
        let mut machine = make_spectrum(&[0x76]);
        machine.press_key(SpectrumKey::Enter);
        let rows = machine.ula().map(|ula| ula.keyboard().read_rows(0xBF));
        assert_eq!(rows, Some(0x1E));
        machine.release_all_keys();
        let rows = machine.ula().map(|ula| ula.keyboard().read_rows(0xBF));
        assert_eq!(rows, Some(0x1F));
    }

    #[test]
    fn queued_keys_apply_at_frame_start() {
        let mut machine = make_spectrum(&[0xF3, 0x76]);
        machine.input_queue().enqueue_key(SpectrumKey::Space, 1, 1);

        machine.run_frame(); // frame 0
        assert!(!machine.ula().is_some_and(|u| u.keyboard().is_pressed(SpectrumKey::Space)));
        machine.run_frame(); // frame 1
        assert!(machine.ula().is_some_and(|u| u.keyboard().is_pressed(SpectrumKey::Space)));
        machine.run_frame(); // frame 2
        assert!(!machine.ula().is_some_and(|u| u.keyboard().is_pressed(SpectrumKey::Space)));
    }

    #[test]
    fn snapshot_reports_machine_state() {
        // LD A,2; OUT (FEh),A; DI; HALT
        let mut machine = make_spectrum(&[0x3E, 0x02, 0xD3, 0xFE, 0xF3, 0x76]);
        machine.run_frame();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.border, 2);
        assert_eq!(snapshot.frame_count, 1);
        assert_eq!(snapshot.cycles, machine.cycles());
        assert!(snapshot.cpu.halted);
        assert_eq!(snapshot.cpu.regs.pc, 0x0005);
    }
}
