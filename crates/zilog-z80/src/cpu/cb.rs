//! CB-prefixed rotate, shift and bit operations.

use emu_core::Bus;

use super::{Handler, Z80};
use crate::alu;
use crate::flags::{CF, HF, PF, SF, XF, YF, ZF, flag_if};

/// Dispatch table for the CB opcode page.
pub(crate) static CB: [Handler; 256] = build();

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

/// Run the opcode following a CB prefix.
pub(crate) fn execute(cpu: &mut Z80, bus: &mut dyn Bus) -> u32 {
    let op = cpu.fetch_opcode(bus);
    CB[usize::from(op)](cpu, bus, op)
}

/// Flags for BIT n. X/Y come from `xy_source`, which depends on the
/// addressing form: the register itself, WZ high for `(HL)`, or the high
/// byte of the address for `(IX+d)`.
pub(crate) fn bit_flags(cpu: &mut Z80, bit: u8, value: u8, xy_source: u8) {
    let tested = value & (1 << (bit & 7));
    let flags = (cpu.f() & CF)
        | HF
        | flag_if(tested == 0, ZF | PF)
        | (tested & SF)
        | (xy_source & (YF | XF));
    cpu.set_f(flags);
}

fn read_modify_write(cpu: &mut Z80, bus: &mut dyn Bus, op: u8, modify: impl Fn(&mut Z80, u8) -> u8) -> u32 {
    let r = op & 7;
    if r == 6 {
        let address = cpu.regs.hl.get();
        let value = bus.read(address);
        let result = modify(cpu, value);
        bus.write(address, result);
        15
    } else {
        let value = cpu.reg8(r);
        let result = modify(cpu, value);
        cpu.set_reg8(r, result);
        8
    }
}

fn rotate_shift(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    read_modify_write(cpu, bus, op, |cpu, value| {
        let result = alu::rotate_shift(op >> 3, value, cpu.f() & CF != 0);
        cpu.set_f(result.flags);
        result.value
    })
}

fn bit(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let r = op & 7;
    if r == 6 {
        let value = bus.read(cpu.regs.hl.get());
        let memptr_high = (cpu.regs.wz >> 8) as u8;
        bit_flags(cpu, op >> 3, value, memptr_high);
        12
    } else {
        let value = cpu.reg8(r);
        bit_flags(cpu, op >> 3, value, value);
        8
    }
}

fn res(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let mask = !(1 << ((op >> 3) & 7));
    read_modify_write(cpu, bus, op, |_, value| value & mask)
}

fn set(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let mask = 1 << ((op >> 3) & 7);
    read_modify_write(cpu, bus, op, |_, value| value | mask)
}
