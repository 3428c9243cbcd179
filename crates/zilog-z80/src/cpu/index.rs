//! DD/FD index prefixes and the DDCB/FDCB page.

use emu_core::Bus;

use super::cb::bit_flags;
use super::{Handler, IndexMode, Z80, base};
use crate::alu;
use crate::flags::CF;

/// Dispatch table for `DD CB d op` and `FD CB d op`. Handlers find the
/// effective address in WZ.
pub(crate) static INDEXED_CB: [Handler; 256] = build();

const fn build() -> [Handler; 256] {
    let mut table: [Handler; 256] = [rotate_shift as Handler; 256];
    let mut op = 0x40;
    while op < 256 {
        let handler: Handler = match op >> 6 {
            1 => bit,
            2 => res,
            _ => set,
        };
        table[op] = handler;
        op += 1;
    }
    table
}

/// Run the instruction following a DD or FD prefix.
///
/// Opcodes that do not involve HL run as if unprefixed, 4 T-states
/// slower. A prefix followed by another DD, FD or ED acts as a 4 T-state
/// no-op; the next prefix is left for the following step.
pub(crate) fn execute(cpu: &mut Z80, bus: &mut dyn Bus, mode: IndexMode) -> u32 {
    let next = bus.read(cpu.regs.pc);
    if matches!(next, 0xDD | 0xED | 0xFD) {
        cpu.prefix_shadow = true;
        return 4;
    }

    cpu.index = mode;
    let cycles = if next == 0xCB {
        cpu.fetch_opcode(bus);
        // d comes before the opcode in this form.
        cpu.operand_address(bus);
        let op = cpu.fetch8(bus);
        INDEXED_CB[usize::from(op)](cpu, bus, op)
    } else {
        let op = cpu.fetch_opcode(bus);
        base::BASE[usize::from(op)](cpu, bus, op) + 4
    };
    cpu.index = IndexMode::Hl;
    cycles
}

/// Read-modify-write at `(IX+d)`. Unless the register field is 6, the
/// result is also copied into that register (undocumented).
fn read_modify_write(cpu: &mut Z80, bus: &mut dyn Bus, op: u8, modify: impl Fn(&mut Z80, u8) -> u8) -> u32 {
    let address = cpu.regs.wz;
    let value = bus.read(address);
    let result = modify(cpu, value);
    bus.write(address, result);
    if op & 7 != 6 {
        cpu.set_reg8_plain(op, result);
    }
    23
}

fn rotate_shift(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    read_modify_write(cpu, bus, op, |cpu, value| {
        let result = alu::rotate_shift(op >> 3, value, cpu.f() & CF != 0);
        cpu.set_f(result.flags);
        result.value
    })
}

fn bit(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let address = cpu.regs.wz;
    let value = bus.read(address);
    bit_flags(cpu, op >> 3, value, (address >> 8) as u8);
    20
}

fn res(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let mask = !(1 << ((op >> 3) & 7));
    read_modify_write(cpu, bus, op, |_, value| value & mask)
}

fn set(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let mask = 1 << ((op >> 3) & 7);
    read_modify_write(cpu, bus, op, |_, value| value | mask)
}
