//! ED-prefixed extended operations.
//!
//! Slots with no documented instruction execute as 8 T-state no-ops. The
//! undocumented mirrors of NEG, RETN and IM decode to the same handlers as
//! the documented forms.

use emu_core::Bus;

use super::{Handler, Z80};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, flag_if, parity, sz53, sz53p};
use crate::interrupt::InterruptMode;

/// Dispatch table for the ED opcode page.
pub(crate) static ED: [Handler; 256] = build();

const fn build() -> [Handler; 256] {
    let mut table: [Handler; 256] = [nop as Handler; 256];
    let mut op = 0x40;
    while op < 0xC0 {
        let y = (op >> 3) & 7;
        let z = op & 7;
        let odd = y & 1 == 1;
        let handler: Handler = if op < 0x80 {
            match z {
                0 => in_r_c,
                1 => out_c_r,
                2 => {
                    if odd {
                        adc_hl_rr
                    } else {
                        sbc_hl_rr
                    }
                }
                3 => {
                    if odd {
                        ld_rr_nn
                    } else {
                        ld_nn_rr
                    }
                }
                4 => neg,
                5 => retn,
                6 => im,
                _ => match y {
                    0 => ld_i_a,
                    1 => ld_r_a,
                    2 => ld_a_i,
                    3 => ld_a_r,
                    4 => rrd,
                    5 => rld,
                    _ => nop,
                },
            }
        } else if y >= 4 {
            match z {
                0 => block_load,
                1 => block_compare,
                2 => block_in,
                3 => block_out,
                _ => nop,
            }
        } else {
            nop
        };
        table[op] = handler;
        op += 1;
    }
    table
}

/// Run the opcode following an ED prefix.
pub(crate) fn execute(cpu: &mut Z80, bus: &mut dyn Bus) -> u32 {
    let op = cpu.fetch_opcode(bus);
    ED[usize::from(op)](cpu, bus, op)
}

fn nop(_cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    8
}

// === Port I/O through BC ===

/// IN r,(C). Register field 6 only sets flags (undocumented `IN (C)`).
fn in_r_c(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let port = cpu.regs.bc.get();
    let value = bus.io_read(port);
    cpu.regs.wz = port.wrapping_add(1);
    cpu.set_f((cpu.f() & CF) | sz53p(value));
    cpu.set_reg8(op >> 3, value);
    12
}

/// OUT (C),r. Register field 6 writes zero (undocumented `OUT (C),0`).
fn out_c_r(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let port = cpu.regs.bc.get();
    let value = cpu.reg8(op >> 3);
    bus.io_write(port, value);
    cpu.regs.wz = port.wrapping_add(1);
    12
}

// === 16-bit arithmetic and loads ===

fn sbc_hl_rr(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    let hl = cpu.regs.hl.get();
    let (result, flags) = alu::sbc16(hl, cpu.rr(op >> 4), cpu.f() & CF != 0);
    cpu.regs.wz = hl.wrapping_add(1);
    cpu.regs.hl.set(result);
    cpu.set_f(flags);
    15
}

fn adc_hl_rr(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    let hl = cpu.regs.hl.get();
    let (result, flags) = alu::adc16(hl, cpu.rr(op >> 4), cpu.f() & CF != 0);
    cpu.regs.wz = hl.wrapping_add(1);
    cpu.regs.hl.set(result);
    cpu.set_f(flags);
    15
}

fn ld_nn_rr(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let address = cpu.fetch16(bus);
    let value = cpu.rr(op >> 4);
    cpu.write16(bus, address, value);
    cpu.regs.wz = address.wrapping_add(1);
    20
}

fn ld_rr_nn(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let address = cpu.fetch16(bus);
    let value = cpu.read16(bus, address);
    cpu.set_rr(op >> 4, value);
    cpu.regs.wz = address.wrapping_add(1);
    20
}

// === Accumulator, interrupt and special registers ===

fn neg(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let result = alu::sub8(0, cpu.a(), false);
    cpu.set_a(result.value);
    cpu.set_f(result.flags);
    8
}

/// RETN and RETI. Both copy IFF2 back into IFF1.
fn retn(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.irq.restore_iff1();
    cpu.regs.pc = cpu.pop(bus);
    cpu.regs.wz = cpu.regs.pc;
    14
}

fn im(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    // ED 4E and ED 6E are undocumented and select mode 0.
    let mode = match (op >> 3) & 3 {
        2 => InterruptMode::Im1,
        3 => InterruptMode::Im2,
        _ => InterruptMode::Im0,
    };
    cpu.irq.set_mode(mode);
    8
}

fn ld_i_a(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.i = cpu.a();
    9
}

fn ld_r_a(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.r = cpu.a();
    9
}

fn special_to_a(cpu: &mut Z80, value: u8) {
    cpu.set_a(value);
    let iff2 = cpu.irq.iff2();
    cpu.set_f((cpu.f() & CF) | sz53(value) | flag_if(iff2, PF));
}

fn ld_a_i(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let i = cpu.regs.i;
    special_to_a(cpu, i);
    9
}

fn ld_a_r(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let r = cpu.regs.r;
    special_to_a(cpu, r);
    9
}

fn rrd(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let hl = cpu.regs.hl.get();
    let value = bus.read(hl);
    let a = cpu.a();
    bus.write(hl, (a << 4) | (value >> 4));
    digit_result(cpu, (a & 0xF0) | (value & 0x0F));
    cpu.regs.wz = hl.wrapping_add(1);
    18
}

fn rld(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let hl = cpu.regs.hl.get();
    let value = bus.read(hl);
    let a = cpu.a();
    bus.write(hl, (value << 4) | (a & 0x0F));
    digit_result(cpu, (a & 0xF0) | (value >> 4));
    cpu.regs.wz = hl.wrapping_add(1);
    18
}

fn digit_result(cpu: &mut Z80, a: u8) {
    cpu.set_a(a);
    cpu.set_f((cpu.f() & CF) | sz53p(a));
}

// === Block transfer, search and I/O ===
//
// Bit 3 of the opcode selects decrement, bit 4 selects the repeating form.
// A repeating instruction that has not finished rewinds PC onto itself and
// costs 21 T-states instead of 16.

fn block_step(op: u8) -> u16 {
    if op & 0x08 == 0 { 1 } else { 0xFFFF }
}

fn block_repeat(cpu: &mut Z80, op: u8, more: bool) -> u32 {
    if op & 0x10 != 0 && more {
        cpu.regs.pc = cpu.regs.pc.wrapping_sub(2);
        cpu.regs.wz = cpu.regs.pc.wrapping_add(1);
        21
    } else {
        16
    }
}

/// LDI, LDD, LDIR, LDDR.
fn block_load(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let step = block_step(op);
    let hl = cpu.regs.hl.get();
    let de = cpu.regs.de.get();
    let value = bus.read(hl);
    bus.write(de, value);
    cpu.regs.hl.set(hl.wrapping_add(step));
    cpu.regs.de.set(de.wrapping_add(step));
    let bc = cpu.regs.bc.get().wrapping_sub(1);
    cpu.regs.bc.set(bc);

    // X and Y come from bits 3 and 1 of A + the transferred byte.
    let n = value.wrapping_add(cpu.a());
    cpu.set_f((cpu.f() & (SF | ZF | CF)) | flag_if(bc != 0, PF) | (n & XF) | ((n << 4) & YF));
    block_repeat(cpu, op, bc != 0)
}

/// CPI, CPD, CPIR, CPDR.
fn block_compare(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let step = block_step(op);
    let hl = cpu.regs.hl.get();
    let value = bus.read(hl);
    let a = cpu.a();
    let result = a.wrapping_sub(value);
    let half = (a & 0x0F) < (value & 0x0F);
    cpu.regs.hl.set(hl.wrapping_add(step));
    let bc = cpu.regs.bc.get().wrapping_sub(1);
    cpu.regs.bc.set(bc);
    cpu.regs.wz = cpu.regs.wz.wrapping_add(step);

    let n = result.wrapping_sub(u8::from(half));
    cpu.set_f(
        (cpu.f() & CF)
            | NF
            | (sz53(result) & (SF | ZF))
            | flag_if(half, HF)
            | flag_if(bc != 0, PF)
            | (n & XF)
            | ((n << 4) & YF),
    );
    block_repeat(cpu, op, bc != 0 && result != 0)
}

/// Flags shared by the block I/O group. `k` is the transferred byte plus
/// the low byte of the register that moved alongside it.
fn block_io_flags(cpu: &mut Z80, value: u8, k: u16) {
    let b = cpu.regs.bc.hi;
    cpu.set_f(
        sz53(b)
            | flag_if(value & 0x80 != 0, NF)
            | flag_if(k > 0xFF, HF | CF)
            | flag_if(parity(((k as u8) & 7) ^ b), PF),
    );
}

/// INI, IND, INIR, INDR.
fn block_in(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let step = block_step(op);
    let port = cpu.regs.bc.get();
    let value = bus.io_read(port);
    let hl = cpu.regs.hl.get();
    bus.write(hl, value);
    cpu.regs.wz = port.wrapping_add(step);
    cpu.regs.bc.hi = cpu.regs.bc.hi.wrapping_sub(1);
    cpu.regs.hl.set(hl.wrapping_add(step));

    let k = u16::from(value) + u16::from(cpu.regs.bc.lo.wrapping_add(step as u8));
    block_io_flags(cpu, value, k);
    let more = cpu.regs.bc.hi != 0;
    block_repeat(cpu, op, more)
}

/// OUTI, OUTD, OTIR, OTDR. B is decremented before it reaches the port
/// address.
fn block_out(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let step = block_step(op);
    let hl = cpu.regs.hl.get();
    let value = bus.read(hl);
    cpu.regs.bc.hi = cpu.regs.bc.hi.wrapping_sub(1);
    let port = cpu.regs.bc.get();
    bus.io_write(port, value);
    cpu.regs.wz = port.wrapping_add(step);
    cpu.regs.hl.set(hl.wrapping_add(step));

    let k = u16::from(value) + u16::from(cpu.regs.hl.lo);
    block_io_flags(cpu, value, k);
    let more = cpu.regs.bc.hi != 0;
    block_repeat(cpu, op, more)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::SimpleBus;

    fn cpu_at_zero(program: &[u8]) -> (Z80, SimpleBus) {
        let mut bus = SimpleBus::new();
        bus.load(0x0000, program);
        let mut cpu = Z80::new();
        cpu.regs.pc = 0;
        (cpu, bus)
    }

    #[test]
    fn every_ed_opcode_runs() {
        for op in 0..=255_u8 {
            let (mut cpu, mut bus) = cpu_at_zero(&[0xED, op, 0x00, 0x00]);
            cpu.regs.sp = 0xFFFE;
            cpu.regs.bc.set(0x0001);
            let cycles = cpu.step(&mut bus);
            assert!((8..=21).contains(&cycles), "ED {op:02X} took {cycles}");
        }
    }

    #[test]
    fn undocumented_im_aliases() {
        for (op, mode) in [
            (0x46, InterruptMode::Im0),
            (0x4E, InterruptMode::Im0),
            (0x56, InterruptMode::Im1),
            (0x5E, InterruptMode::Im2),
            (0x66, InterruptMode::Im0),
            (0x6E, InterruptMode::Im0),
            (0x76, InterruptMode::Im1),
            (0x7E, InterruptMode::Im2),
        ] {
            let (mut cpu, mut bus) = cpu_at_zero(&[0xED, op]);
            cpu.irq.set_mode(InterruptMode::Im2);
            if mode == InterruptMode::Im2 {
                cpu.irq.set_mode(InterruptMode::Im0);
            }
            assert_eq!(cpu.step(&mut bus), 8);
            assert_eq!(cpu.irq.mode(), mode, "ED {op:02X}");
        }
    }

    #[test]
    fn ldir_repeats_until_bc_is_zero() {
        let (mut cpu, mut bus) = cpu_at_zero(&[0xED, 0xB0]);
        bus.load(0x4000, &[1, 2, 3]);
        cpu.regs.hl.set(0x4000);
        cpu.regs.de.set(0x5000);
        cpu.regs.bc.set(3);
        assert_eq!(cpu.step(&mut bus), 21);
        assert_eq!(cpu.regs.pc, 0x0000);
        assert_eq!(cpu.step(&mut bus), 21);
        assert_eq!(cpu.step(&mut bus), 16);
        assert_eq!(cpu.regs.pc, 0x0002);
        assert_eq!([bus.peek(0x5000), bus.peek(0x5001), bus.peek(0x5002)], [1, 2, 3]);
        assert_eq!(cpu.f() & PF, 0);
    }

    #[test]
    fn cpir_stops_on_match() {
        let (mut cpu, mut bus) = cpu_at_zero(&[0xED, 0xB1]);
        bus.load(0x4000, &[0x10, 0x20, 0x30]);
        cpu.regs.af.hi = 0x20;
        cpu.regs.hl.set(0x4000);
        cpu.regs.bc.set(10);
        assert_eq!(cpu.step(&mut bus), 21);
        assert_eq!(cpu.step(&mut bus), 16);
        assert_eq!(cpu.regs.hl.get(), 0x4002);
        assert_eq!(cpu.regs.bc.get(), 8);
        assert_ne!(cpu.f() & ZF, 0);
        assert_ne!(cpu.f() & PF, 0);
    }

    #[test]
    fn neg_of_0x80_overflows() {
        let (mut cpu, mut bus) = cpu_at_zero(&[0xED, 0x44]);
        cpu.regs.af.hi = 0x80;
        cpu.step(&mut bus);
        assert_eq!(cpu.a(), 0x80);
        assert_ne!(cpu.f() & PF, 0);
        assert_ne!(cpu.f() & CF, 0);
    }

    #[test]
    fn rld_rotates_nibbles() {
        let (mut cpu, mut bus) = cpu_at_zero(&[0xED, 0x6F]);
        bus.load(0x4000, &[0x31]);
        cpu.regs.af.hi = 0x7A;
        cpu.regs.hl.set(0x4000);
        assert_eq!(cpu.step(&mut bus), 18);
        assert_eq!(cpu.a(), 0x73);
        assert_eq!(bus.peek(0x4000), 0x1A);
    }

    #[test]
    fn otir_writes_port_after_decrementing_b() {
        let (mut cpu, mut bus) = cpu_at_zero(&[0xED, 0xB3]);
        bus.load(0x4000, &[0xAA, 0xBB]);
        cpu.regs.hl.set(0x4000);
        cpu.regs.bc.set(0x02FE);
        assert_eq!(cpu.step(&mut bus), 21);
        assert_eq!(cpu.step(&mut bus), 16);
        assert_eq!(bus.port_writes, vec![(0x01FE, 0xAA), (0x00FE, 0xBB)]);
        assert_ne!(cpu.f() & ZF, 0);
    }
}
