//! Unprefixed opcodes.
//!
//! Handlers run both for plain opcodes and for opcodes following DD/FD;
//! in the latter case `hl_value`, `reg8` and `operand_address` resolve to
//! the index register. Costs returned here are for the unprefixed form.

use emu_core::Bus;

use super::{Handler, IndexMode, Z80, cb, ed, index};
use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, flag_if};

/// Dispatch table for the unprefixed opcode page.
pub(crate) static BASE: [Handler; 256] = build();

const fn build() -> [Handler; 256] {
    let mut table: [Handler; 256] = [nop as Handler; 256];
    let mut op = 0;
    while op < 256 {
        let y = (op >> 3) & 7;
        let z = op & 7;
        let odd = y & 1 == 1;
        let handler: Handler = match op >> 6 {
            0 => match z {
                0 => match y {
                    0 => nop,
                    1 => ex_af,
                    2 => djnz,
                    3 => jr,
                    _ => jr_cc,
                },
                1 => {
                    if odd {
                        add_hl_rr
                    } else {
                        ld_rr_nn
                    }
                }
                2 => match y {
                    0 | 2 => ld_indirect_a,
                    1 | 3 => ld_a_indirect,
                    4 => ld_nn_hl,
                    5 => ld_hl_nn,
                    6 => ld_nn_a,
                    _ => ld_a_nn,
                },
                3 => {
                    if odd {
                        dec_rr
                    } else {
                        inc_rr
                    }
                }
                4 => inc_r,
                5 => dec_r,
                6 => ld_r_n,
                _ => match y {
                    0..=3 => rotate_a,
                    4 => daa,
                    5 => cpl,
                    6 => scf,
                    _ => ccf,
                },
            },
            1 => {
                if op == 0x76 {
                    halt
                } else {
                    ld_r_r
                }
            }
            2 => alu_r,
            _ => match z {
                0 => ret_cc,
                1 => match y {
                    1 => ret,
                    3 => exx,
                    5 => jp_hl,
                    7 => ld_sp_hl,
                    _ => pop,
                },
                2 => jp_cc,
                3 => match y {
                    0 => jp,
                    1 => prefix_cb,
                    2 => out_n_a,
                    3 => in_a_n,
                    4 => ex_sp_hl,
                    5 => ex_de_hl,
                    6 => di,
                    _ => ei,
                },
                4 => call_cc,
                5 => match y {
                    1 => call,
                    3 => prefix_dd,
                    5 => prefix_ed,
                    7 => prefix_fd,
                    _ => push,
                },
                6 => alu_n,
                _ => rst,
            },
        };
        table[op] = handler;
        op += 1;
    }
    table
}

// === Prefixes ===

fn prefix_cb(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    cb::execute(cpu, bus)
}

fn prefix_ed(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    ed::execute(cpu, bus)
}

fn prefix_dd(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    index::execute(cpu, bus, IndexMode::Ix)
}

fn prefix_fd(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    index::execute(cpu, bus, IndexMode::Iy)
}

// === Control ===

fn nop(_cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    4
}

fn halt(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    // PC stays on the HALT opcode until an interrupt moves it on.
    cpu.halted = true;
    cpu.regs.pc = cpu.regs.pc.wrapping_sub(1);
    4
}

fn di(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.irq.set_mask(false);
    4
}

fn ei(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.irq.set_mask(true);
    cpu.ei_shadow = true;
    4
}

fn ex_af(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.exchange_af();
    4
}

fn exx(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.exchange_main();
    4
}

fn ex_de_hl(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    // Never affected by DD/FD.
    core::mem::swap(&mut cpu.regs.de, &mut cpu.regs.hl);
    4
}

fn ex_sp_hl(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let sp = cpu.regs.sp;
    let value = cpu.read16(bus, sp);
    cpu.write16(bus, sp, cpu.hl_value());
    cpu.set_hl_value(value);
    cpu.regs.wz = value;
    19
}

// === Jumps, calls and returns ===

fn relative_jump(cpu: &mut Z80, d: u8) {
    cpu.regs.pc = cpu.regs.pc.wrapping_add_signed(i16::from(d as i8));
    cpu.regs.wz = cpu.regs.pc;
}

fn djnz(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let d = cpu.fetch8(bus);
    cpu.regs.bc.hi = cpu.regs.bc.hi.wrapping_sub(1);
    if cpu.regs.bc.hi == 0 {
        8
    } else {
        relative_jump(cpu, d);
        13
    }
}

fn jr(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let d = cpu.fetch8(bus);
    relative_jump(cpu, d);
    12
}

fn jr_cc(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let d = cpu.fetch8(bus);
    // JR has only NZ, Z, NC and C.
    if cpu.condition((op >> 3) & 3) {
        relative_jump(cpu, d);
        12
    } else {
        7
    }
}

fn jp(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let target = cpu.fetch16(bus);
    cpu.regs.pc = target;
    cpu.regs.wz = target;
    10
}

fn jp_cc(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let target = cpu.fetch16(bus);
    cpu.regs.wz = target;
    if cpu.condition(op >> 3) {
        cpu.regs.pc = target;
    }
    10
}

fn jp_hl(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.pc = cpu.hl_value();
    4
}

fn call(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let target = cpu.fetch16(bus);
    cpu.push(bus, cpu.regs.pc);
    cpu.regs.pc = target;
    cpu.regs.wz = target;
    17
}

fn call_cc(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let target = cpu.fetch16(bus);
    cpu.regs.wz = target;
    if cpu.condition(op >> 3) {
        cpu.push(bus, cpu.regs.pc);
        cpu.regs.pc = target;
        17
    } else {
        10
    }
}

fn ret(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.pc = cpu.pop(bus);
    cpu.regs.wz = cpu.regs.pc;
    10
}

fn ret_cc(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    if cpu.condition(op >> 3) {
        cpu.regs.pc = cpu.pop(bus);
        cpu.regs.wz = cpu.regs.pc;
        11
    } else {
        5
    }
}

fn rst(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    cpu.push(bus, cpu.regs.pc);
    cpu.regs.pc = u16::from(op & 0x38);
    cpu.regs.wz = cpu.regs.pc;
    11
}

// === 16-bit loads and arithmetic ===

fn ld_rr_nn(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let value = cpu.fetch16(bus);
    cpu.set_rr(op >> 4, value);
    10
}

fn inc_rr(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    let p = op >> 4;
    cpu.set_rr(p, cpu.rr(p).wrapping_add(1));
    6
}

fn dec_rr(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    let p = op >> 4;
    cpu.set_rr(p, cpu.rr(p).wrapping_sub(1));
    6
}

fn add_hl_rr(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    let hl = cpu.hl_value();
    let (result, flags) = alu::add16(hl, cpu.rr(op >> 4));
    cpu.regs.wz = hl.wrapping_add(1);
    cpu.set_hl_value(result);
    cpu.set_f((cpu.f() & (SF | ZF | PF)) | flags);
    11
}

fn ld_nn_hl(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let address = cpu.fetch16(bus);
    cpu.write16(bus, address, cpu.hl_value());
    cpu.regs.wz = address.wrapping_add(1);
    16
}

fn ld_hl_nn(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let address = cpu.fetch16(bus);
    let value = cpu.read16(bus, address);
    cpu.set_hl_value(value);
    cpu.regs.wz = address.wrapping_add(1);
    16
}

fn ld_sp_hl(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    cpu.regs.sp = cpu.hl_value();
    6
}

fn push(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let value = cpu.rr_af(op >> 4);
    cpu.push(bus, value);
    11
}

fn pop(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let value = cpu.pop(bus);
    cpu.set_rr_af(op >> 4, value);
    10
}

// === 8-bit loads ===

/// LD (BC),A / LD (DE),A.
fn ld_indirect_a(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let address = if op & 0x10 == 0 {
        cpu.regs.bc.get()
    } else {
        cpu.regs.de.get()
    };
    let a = cpu.a();
    bus.write(address, a);
    cpu.regs.wz = u16::from_be_bytes([a, address.wrapping_add(1) as u8]);
    7
}

/// LD A,(BC) / LD A,(DE).
fn ld_a_indirect(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let address = if op & 0x10 == 0 {
        cpu.regs.bc.get()
    } else {
        cpu.regs.de.get()
    };
    let value = bus.read(address);
    cpu.set_a(value);
    cpu.regs.wz = address.wrapping_add(1);
    7
}

fn ld_nn_a(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let address = cpu.fetch16(bus);
    let a = cpu.a();
    bus.write(address, a);
    cpu.regs.wz = u16::from_be_bytes([a, address.wrapping_add(1) as u8]);
    13
}

fn ld_a_nn(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let address = cpu.fetch16(bus);
    let value = bus.read(address);
    cpu.set_a(value);
    cpu.regs.wz = address.wrapping_add(1);
    13
}

fn ld_r_n(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let r = op >> 3;
    if r & 7 == 6 {
        // LD (IX+d),n reads d before n.
        let address = cpu.operand_address(bus);
        let n = cpu.fetch8(bus);
        bus.write(address, n);
        let extra = if cpu.index == IndexMode::Hl { 0 } else { 5 };
        10 + extra
    } else {
        let n = cpu.fetch8(bus);
        cpu.set_reg8(r, n);
        7
    }
}

fn ld_r_r(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let dst = (op >> 3) & 7;
    let src = op & 7;
    if src == 6 {
        let address = cpu.operand_address(bus);
        let value = bus.read(address);
        cpu.set_reg8_plain(dst, value);
        7 + cpu.displacement_cost()
    } else if dst == 6 {
        let address = cpu.operand_address(bus);
        bus.write(address, cpu.reg8_plain(src));
        7 + cpu.displacement_cost()
    } else {
        cpu.set_reg8(dst, cpu.reg8(src));
        4
    }
}

// === 8-bit arithmetic ===

fn accumulate(cpu: &mut Z80, op: u8, operand: u8) {
    let result = alu::accumulate(op >> 3, cpu.a(), operand, cpu.f() & CF != 0);
    cpu.set_a(result.value);
    cpu.set_f(result.flags);
}

fn alu_r(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    if op & 7 == 6 {
        let address = cpu.operand_address(bus);
        let value = bus.read(address);
        accumulate(cpu, op, value);
        7 + cpu.displacement_cost()
    } else {
        let value = cpu.reg8(op);
        accumulate(cpu, op, value);
        4
    }
}

fn alu_n(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    let n = cpu.fetch8(bus);
    accumulate(cpu, op, n);
    7
}

fn inc_r(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    step_r(cpu, bus, op >> 3, alu::inc8)
}

fn dec_r(cpu: &mut Z80, bus: &mut dyn Bus, op: u8) -> u32 {
    step_r(cpu, bus, op >> 3, alu::dec8)
}

/// INC/DEC on a register or memory operand. Carry is preserved.
fn step_r(cpu: &mut Z80, bus: &mut dyn Bus, r: u8, apply: fn(u8) -> alu::AluResult) -> u32 {
    let carry = cpu.f() & CF;
    if r & 7 == 6 {
        let address = cpu.operand_address(bus);
        let result = apply(bus.read(address));
        bus.write(address, result.value);
        cpu.set_f(result.flags | carry);
        11 + cpu.displacement_cost()
    } else {
        let result = apply(cpu.reg8(r));
        cpu.set_reg8(r, result.value);
        cpu.set_f(result.flags | carry);
        4
    }
}

// === Accumulator and flag operations ===

/// RLCA, RRCA, RLA, RRA: like their CB forms but S, Z and P/V survive.
fn rotate_a(cpu: &mut Z80, _bus: &mut dyn Bus, op: u8) -> u32 {
    let f = cpu.f();
    let result = alu::rotate_shift(op >> 3, cpu.a(), f & CF != 0);
    cpu.set_a(result.value);
    cpu.set_f((f & (SF | ZF | PF)) | (result.value & (YF | XF)) | (result.flags & CF));
    4
}

fn daa(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let result = alu::daa(cpu.a(), cpu.f());
    cpu.set_a(result.value);
    cpu.set_f(result.flags);
    4
}

fn cpl(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let a = !cpu.a();
    cpu.set_a(a);
    cpu.set_f((cpu.f() & (SF | ZF | PF | CF)) | HF | NF | (a & (YF | XF)));
    4
}

/// X/Y after SCF/CCF: bits of A, ORed with flag bits the previous
/// instruction did not itself write.
fn carry_op_xy(cpu: &Z80) -> u8 {
    ((cpu.last_q ^ cpu.f()) | cpu.a()) & (YF | XF)
}

fn scf(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let xy = carry_op_xy(cpu);
    cpu.set_f((cpu.f() & (SF | ZF | PF)) | xy | CF);
    4
}

fn ccf(cpu: &mut Z80, _bus: &mut dyn Bus, _op: u8) -> u32 {
    let xy = carry_op_xy(cpu);
    let f = cpu.f();
    let carry = f & CF != 0;
    cpu.set_f((f & (SF | ZF | PF)) | xy | flag_if(carry, HF) | flag_if(!carry, CF));
    4
}

// === I/O ===

fn out_n_a(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let n = cpu.fetch8(bus);
    let a = cpu.a();
    bus.io_write(u16::from_be_bytes([a, n]), a);
    cpu.regs.wz = u16::from_be_bytes([a, n.wrapping_add(1)]);
    11
}

fn in_a_n(cpu: &mut Z80, bus: &mut dyn Bus, _op: u8) -> u32 {
    let n = cpu.fetch8(bus);
    let port = u16::from_be_bytes([cpu.a(), n]);
    let value = bus.io_read(port);
    cpu.set_a(value);
    cpu.regs.wz = port.wrapping_add(1);
    11
}
