//! Memory and I/O bus interface.

/// Memory and I/O bus interface.
///
/// Components access memory and peripherals through this trait. The bus
/// handles address decoding and routing to the appropriate device. Memory
/// and port accesses are separate address spaces, as on the Z80.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, address: u16, value: u8);

    /// Read a byte from an I/O port. The full 16-bit port address is
    /// passed; peripherals decode whichever bits they care about.
    fn io_read(&mut self, _port: u16) -> u8 {
        0xFF
    }

    /// Write a byte to an I/O port.
    fn io_write(&mut self, _port: u16, _value: u8) {}
}

/// Flat 64K RAM bus with a port table, for tests and tooling.
///
/// Port reads return the last value stored with [`SimpleBus::set_port`]
/// (or 0xFF); port writes are recorded in order.
#[derive(Debug, Clone)]
pub struct SimpleBus {
    memory: Box<[u8; 0x10000]>,
    ports: Box<[u8; 0x10000]>,
    /// Every port write as `(port, value)`, oldest first.
    pub port_writes: Vec<(u16, u8)>,
}

impl SimpleBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            memory: Box::new([0; 0x10000]),
            ports: Box::new([0xFF; 0x10000]),
            port_writes: Vec::new(),
        }
    }

    /// Copy `bytes` into memory starting at `address`, wrapping at 0xFFFF.
    pub fn load(&mut self, address: u16, bytes: &[u8]) {
        for (i, &byte) in bytes.iter().enumerate() {
            self.memory[usize::from(address.wrapping_add(i as u16))] = byte;
        }
    }

    /// Read memory without going through the `Bus` trait.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    /// Set the value returned by reads of `port`.
    pub fn set_port(&mut self, port: u16, value: u8) {
        self.ports[usize::from(port)] = value;
    }
}

impl Default for SimpleBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for SimpleBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[usize::from(address)]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[usize::from(address)] = value;
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.ports[usize::from(port)]
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.port_writes.push((port, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_wraps_at_top_of_memory() {
        let mut bus = SimpleBus::new();
        bus.load(0xFFFF, &[0x11, 0x22]);
        assert_eq!(bus.peek(0xFFFF), 0x11);
        assert_eq!(bus.peek(0x0000), 0x22);
    }

    #[test]
    fn ports_default_to_idle_and_record_writes() {
        let mut bus = SimpleBus::new();
        assert_eq!(bus.io_read(0x12FE), 0xFF);
        bus.set_port(0x12FE, 0x1F);
        assert_eq!(bus.io_read(0x12FE), 0x1F);
        bus.io_write(0x00FE, 0x07);
        assert_eq!(bus.port_writes, vec![(0x00FE, 0x07)]);
    }
}
