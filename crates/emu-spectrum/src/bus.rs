//! Spectrum bus.
//!
//! Connects the Z80 to the address space and the port space. Neither side
//! knows about the other; the ULA reaches video memory only through the
//! frame hand-off at the end of each frame.

use emu_core::Bus;

use crate::io::IoSpace;
use crate::memory::AddressSpace;

/// The Spectrum bus, implementing `emu_core::Bus`.
pub struct SpectrumBus {
    pub memory: AddressSpace,
    pub io: IoSpace,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: AddressSpace, io: IoSpace) -> Self {
        Self { memory, io }
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory.write(address, value);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.io.read(port)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.io.write(port, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::IoSpaceBuilder;
    use crate::memory::MemoryMap;
    use crate::ula::{ULA_DECODE, Ula};

    fn make_bus() -> SpectrumBus {
        let memory = AddressSpace::new(&MemoryMap::spectrum_48k()).expect("valid map");
        let io = IoSpaceBuilder::new().register(ULA_DECODE, Ula::default()).build();
        SpectrumBus::new(memory, io)
    }

    #[test]
    fn memory_read_write() {
        let mut bus = make_bus();
        bus.write(0x8000, 0xAB);
        assert_eq!(bus.read(0x8000), 0xAB);
    }

    #[test]
    fn rom_write_ignored() {
        let mut bus = make_bus();
        bus.write(0x0000, 0xFF);
        assert_eq!(bus.read(0x0000), 0x00);
    }

    #[test]
    fn keyboard_read_via_io() {
        let mut bus = make_bus();
        assert_eq!(bus.io_read(0xFEFE) & 0x1F, 0x1F);

        // Caps shift: row 0, bit 0
        let ula = bus.io.handler_mut::<Ula>().expect("ULA registered");
        ula.keyboard_mut().set_key(0, 0, true);
        assert_eq!(bus.io_read(0xFEFE) & 0x01, 0x00);
    }

    #[test]
    fn border_and_speaker_via_io() {
        let mut bus = make_bus();
        bus.io_write(0x00FE, 0x12);
        let ula = bus.io.handler::<Ula>().expect("ULA registered");
        assert_eq!(ula.border(), 2);
        assert!(ula.speaker());
    }

    #[test]
    fn odd_port_floats_high() {
        let mut bus = make_bus();
        assert_eq!(bus.io_read(0x00FF), 0xFF);
        assert_eq!(bus.io_read(0x001F), 0xFF);
    }
}
