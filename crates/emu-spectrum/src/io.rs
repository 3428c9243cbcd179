//! Port address space.
//!
//! Peripherals register once, with a partial address decode, while the
//! machine is built. The Spectrum decodes very few address lines: the ULA
//! answers any even port, so writes go to every handler whose decode
//! matches, and reads come from the first.

use std::any::Any;

use tracing::trace;

/// A peripheral on the I/O bus.
///
/// `port` is the full 16-bit address; the high byte often carries data
/// (the ULA uses it to select keyboard rows).
pub trait PortHandler: Any + Send {
    fn read(&mut self, port: u16) -> u8;
    fn write(&mut self, port: u16, value: u8);
}

/// Partial address decode: a port matches when `port & mask == value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDecode {
    pub mask: u16,
    pub value: u16,
}

impl PortDecode {
    #[must_use]
    pub const fn new(mask: u16, value: u16) -> Self {
        Self { mask, value }
    }

    #[must_use]
    pub const fn matches(self, port: u16) -> bool {
        port & self.mask == self.value
    }
}

/// Collects handlers before the port space is frozen.
pub struct IoSpaceBuilder {
    idle: u8,
    handlers: Vec<(PortDecode, Box<dyn PortHandler>)>,
}

impl IoSpaceBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            idle: 0xFF,
            handlers: Vec::new(),
        }
    }

    /// Value returned by reads no handler claims.
    #[must_use]
    pub fn idle_value(mut self, value: u8) -> Self {
        self.idle = value;
        self
    }

    /// Add a handler. Earlier registrations win on reads.
    #[must_use]
    pub fn register(mut self, decode: PortDecode, handler: impl PortHandler) -> Self {
        self.handlers.push((decode, Box::new(handler)));
        self
    }

    #[must_use]
    pub fn build(self) -> IoSpace {
        IoSpace {
            idle: self.idle,
            handlers: self.handlers,
        }
    }
}

impl Default for IoSpaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The machine's port space. The set of handlers is fixed after build.
pub struct IoSpace {
    idle: u8,
    handlers: Vec<(PortDecode, Box<dyn PortHandler>)>,
}

impl IoSpace {
    /// Read from the first matching handler, or the idle value.
    pub fn read(&mut self, port: u16) -> u8 {
        match self
            .handlers
            .iter_mut()
            .find(|(decode, _)| decode.matches(port))
        {
            Some((_, handler)) => handler.read(port),
            None => {
                trace!(port, "idle port read");
                self.idle
            }
        }
    }

    /// Deliver a write to every matching handler.
    pub fn write(&mut self, port: u16, value: u8) {
        for (decode, handler) in &mut self.handlers {
            if decode.matches(port) {
                handler.write(port, value);
            }
        }
    }

    /// The first registered handler of type `T`.
    #[must_use]
    pub fn handler<T: PortHandler>(&self) -> Option<&T> {
        self.handlers.iter().find_map(|(_, handler)| {
            let any: &dyn Any = &**handler;
            any.downcast_ref::<T>()
        })
    }

    /// Mutable access to the first registered handler of type `T`.
    pub fn handler_mut<T: PortHandler>(&mut self) -> Option<&mut T> {
        self.handlers.iter_mut().find_map(|(_, handler)| {
            let any: &mut dyn Any = &mut **handler;
            any.downcast_mut::<T>()
        })
    }
}
