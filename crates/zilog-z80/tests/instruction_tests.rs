//! Tests for individual Z80 instructions and short programs.
//!
//! Programs end in HALT; the CPU is stepped until it halts and then the
//! registers and memory are checked.

use emu_core::{Cpu, SimpleBus};
use zilog_z80::{CF, HF, NF, PF, SF, XF, YF, ZF, Z80};

/// Step the CPU until it HALTs, return total T-states.
fn run_until_halt(cpu: &mut Z80, bus: &mut SimpleBus) -> u64 {
    let mut cycles = 0;
    let mut steps = 0;
    while !cpu.is_halted() && steps < 10_000 {
        cycles += u64::from(cpu.step(bus));
        steps += 1;
    }
    cycles
}

fn run(program: &[u8]) -> (Z80, SimpleBus) {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, program);
    let mut cpu = Z80::new();
    cpu.set_pc(0x0000);
    cpu.set_sp(0xFFFF);
    run_until_halt(&mut cpu, &mut bus);
    (cpu, bus)
}

#[test]
fn test_nop_then_halt() {
    let (cpu, _) = run(&[0x00, 0x76]);
    // PC stays on the HALT opcode.
    assert_eq!(cpu.pc(), 0x0001);
}

#[test]
fn test_halted_cpu_burns_four_cycles() {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &[0x76]);
    let mut cpu = Z80::new();
    cpu.set_pc(0x0000);
    cpu.step(&mut bus);
    for _ in 0..3 {
        assert_eq!(cpu.step(&mut bus), 4);
        assert_eq!(cpu.pc(), 0x0000);
    }
}

#[test]
fn test_ld_a_n() {
    let (cpu, _) = run(&[0x3E, 0x42, 0x76]); // LD A,0x42; HALT
    assert_eq!(cpu.a(), 0x42);
}

#[test]
fn test_push_pop_bc() {
    let (cpu, _) = run(&[
        0x01, 0x34, 0x12, // LD BC,0x1234
        0x31, 0x00, 0x80, // LD SP,0x8000
        0xC5, //             PUSH BC
        0x01, 0x00, 0x00, // LD BC,0x0000
        0xC1, //             POP BC
        0x76, //             HALT
    ]);
    assert_eq!(cpu.bc(), 0x1234);
    assert_eq!(cpu.sp(), 0x8000);
}

#[test]
fn test_increment_loop_leaves_count_in_memory() {
    let (cpu, bus) = run(&[
        0x06, 0x0A, //       LD B,10
        0x3A, 0x00, 0x80, // loop: LD A,(0x8000)
        0x3C, //             INC A
        0x32, 0x00, 0x80, // LD (0x8000),A
        0x10, 0xF7, //       DJNZ loop
        0x76, //             HALT
    ]);
    assert_eq!(bus.peek(0x8000), 10);
    assert_eq!(cpu.pc(), 0x000B);
    assert!(cpu.is_halted());
}

#[test]
fn test_call_and_ret() {
    let (cpu, _) = run(&[
        0xCD, 0x10, 0x00, // CALL 0x0010
        0x76, //             HALT
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
        0x3E, 0x99, //       0x0010: LD A,0x99
        0xC9, //             RET
    ]);
    assert_eq!(cpu.a(), 0x99);
    assert_eq!(cpu.pc(), 0x0003);
    assert_eq!(cpu.sp(), 0xFFFF);
}

#[test]
fn test_add_overflow_flags() {
    let (cpu, _) = run(&[0x3E, 0x7F, 0xC6, 0x01, 0x76]); // LD A,0x7F; ADD A,1
    assert_eq!(cpu.a(), 0x80);
    assert_eq!(cpu.f(), SF | HF | PF);
}

#[test]
fn test_sub_to_zero() {
    let (cpu, _) = run(&[0x3E, 0x42, 0xD6, 0x42, 0x76]); // LD A,0x42; SUB 0x42
    assert_eq!(cpu.a(), 0x00);
    assert_eq!(cpu.f(), ZF | NF);
}

#[test]
fn test_inc_preserves_carry() {
    let (cpu, _) = run(&[0x37, 0x3E, 0xFF, 0x3C, 0x76]); // SCF; LD A,0xFF; INC A
    assert_eq!(cpu.a(), 0x00);
    assert_eq!(cpu.f() & (ZF | HF | CF), ZF | HF | CF);
}

#[test]
fn test_daa_bcd_addition() {
    // LD A,0x19; ADD A,0x28; DAA -> BCD 47
    let (cpu, _) = run(&[0x3E, 0x19, 0xC6, 0x28, 0x27, 0x76]);
    assert_eq!(cpu.a(), 0x47);
    assert_eq!(cpu.f() & CF, 0);
}

#[test]
fn test_sbc_hl_overflow() {
    // LD HL,0x8000; LD BC,0x0001; AND A (clear carry); SBC HL,BC
    let (cpu, _) = run(&[0x21, 0x00, 0x80, 0x01, 0x01, 0x00, 0xA7, 0xED, 0x42, 0x76]);
    assert_eq!(cpu.hl(), 0x7FFF);
    assert_eq!(cpu.f() & (PF | NF | HF | CF | ZF), PF | NF | HF);
}

#[test]
fn test_xor_a_parity() {
    let (cpu, _) = run(&[0x3E, 0x55, 0xAF, 0x76]); // LD A,0x55; XOR A
    assert_eq!(cpu.a(), 0);
    assert_eq!(cpu.f(), ZF | PF);
}

#[test]
fn test_ex_af_and_exx() {
    let (cpu, _) = run(&[
        0x3E, 0x11, //       LD A,0x11
        0x08, //             EX AF,AF'
        0x3E, 0x22, //       LD A,0x22
        0x21, 0x33, 0x33, // LD HL,0x3333
        0xD9, //             EXX
        0x21, 0x44, 0x44, // LD HL,0x4444
        0xD9, //             EXX
        0x76,
    ]);
    assert_eq!(cpu.a(), 0x22);
    assert_eq!(cpu.regs().af_alt.hi, 0x11);
    assert_eq!(cpu.hl(), 0x3333);
    assert_eq!(cpu.regs().hl_alt.get(), 0x4444);
}

#[test]
fn test_index_register_halves() {
    let (cpu, _) = run(&[
        0xDD, 0x21, 0x34, 0x12, // LD IX,0x1234
        0xDD, 0x7C, //             LD A,IXH
        0xDD, 0x85, //             ADD A,IXL
        0x76,
    ]);
    assert_eq!(cpu.a(), 0x46);
    assert_eq!(cpu.regs().ix.get(), 0x1234);
}

#[test]
fn test_ex_de_hl_ignores_prefix() {
    let (cpu, _) = run(&[
        0x21, 0x11, 0x11, //       LD HL,0x1111
        0x11, 0x22, 0x22, //       LD DE,0x2222
        0xDD, 0x21, 0x33, 0x33, // LD IX,0x3333
        0xDD, 0xEB, //             EX DE,HL (prefix ignored)
        0x76,
    ]);
    assert_eq!(cpu.hl(), 0x2222);
    assert_eq!(cpu.de(), 0x1111);
    assert_eq!(cpu.regs().ix.get(), 0x3333);
}

#[test]
fn test_indexed_store_and_load() {
    let (cpu, bus) = run(&[
        0xFD, 0x21, 0x00, 0x90, //  LD IY,0x9000
        0xFD, 0x36, 0xFE, 0x77, //  LD (IY-2),0x77
        0xFD, 0x34, 0xFE, //        INC (IY-2)
        0xFD, 0x7E, 0xFE, //        LD A,(IY-2)
        0x76,
    ]);
    assert_eq!(bus.peek(0x8FFE), 0x78);
    assert_eq!(cpu.a(), 0x78);
}

#[test]
fn test_sll_is_undocumented_shift_in_one() {
    let (cpu, _) = run(&[0x06, 0x40, 0xCB, 0x30, 0x76]); // LD B,0x40; SLL B
    assert_eq!(cpu.bc() >> 8, 0x81);
}

#[test]
fn test_bit_hl_takes_xy_from_memptr() {
    let (cpu, _) = run(&[
        0x3A, 0x00, 0x28, // LD A,(0x2800): MEMPTR = 0x2801
        0x21, 0x00, 0x40, // LD HL,0x4000
        0xCB, 0x46, //       BIT 0,(HL)
        0x76,
    ]);
    assert_eq!(cpu.f() & (YF | XF), YF | XF);
    assert_ne!(cpu.f() & ZF, 0);
}

#[test]
fn test_scf_xy_after_pop_af() {
    // POP AF does not write Q, so X/Y come from F itself.
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &[0x31, 0x00, 0x80, 0xF1, 0x37, 0x76]); // LD SP,0x8000; POP AF; SCF
    bus.load(0x8000, &[0x28, 0x00]); // F = 0x28, A = 0x00
    let mut cpu = Z80::new();
    cpu.set_pc(0);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.f() & (YF | XF), YF | XF);
    assert_ne!(cpu.f() & CF, 0);
}

#[test]
fn test_scf_xy_after_flag_write() {
    // CP 0x28 writes X/Y into F and Q; SCF then takes X/Y only from A.
    let (cpu, _) = run(&[0xAF, 0xFE, 0x28, 0x37, 0x76]); // XOR A; CP 0x28; SCF
    assert_eq!(cpu.f() & (YF | XF), 0);
    assert_ne!(cpu.f() & CF, 0);
}

#[test]
fn test_ccf_complements_carry_into_half_carry() {
    let (cpu, _) = run(&[0x37, 0x3F, 0x76]); // SCF; CCF
    assert_eq!(cpu.f() & (HF | CF), HF);
}

#[test]
fn test_lddr_copies_backwards() {
    let (_, bus) = run(&[
        0x21, 0x02, 0x40, // LD HL,0x4002
        0x11, 0x02, 0x50, // LD DE,0x5002
        0x01, 0x03, 0x00, // LD BC,3
        0x3E, 0xAB, //       LD A,0xAB
        0x32, 0x00, 0x40, // LD (0x4000),A
        0x32, 0x02, 0x40, // LD (0x4002),A
        0xED, 0xB8, //       LDDR
        0x76,
    ]);
    assert_eq!([bus.peek(0x5000), bus.peek(0x5001), bus.peek(0x5002)], [0xAB, 0x00, 0xAB]);
}

#[test]
fn test_in_and_out_use_full_port_address() {
    let mut bus = SimpleBus::new();
    bus.set_port(0xFEFE, 0x1E);
    bus.load(0x0000, &[
        0x3E, 0xFE, // LD A,0xFE
        0xDB, 0xFE, // IN A,(0xFE): port 0xFEFE
        0x01, 0xFE, 0x12, // LD BC,0x12FE
        0xED, 0x79, // OUT (C),A
        0x76,
    ]);
    let mut cpu = Z80::new();
    cpu.set_pc(0);
    run_until_halt(&mut cpu, &mut bus);
    assert_eq!(cpu.a(), 0x1E);
    assert_eq!(bus.port_writes, vec![(0x12FE, 0x1E)]);
}

#[test]
fn test_refresh_register_counts_opcode_fetches() {
    // NOP; LD IX,0 (two M1 fetches); BIT 0,(IX+0) via DDCB (two M1 fetches)
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &[0x00, 0xDD, 0x21, 0x00, 0x00, 0xDD, 0xCB, 0x00, 0x46]);
    let mut cpu = Z80::new();
    cpu.set_pc(0);
    cpu.regs_mut().r = 0x80;
    for _ in 0..3 {
        cpu.step(&mut bus);
    }
    assert_eq!(cpu.regs().r, 0x85);
}

#[test]
fn test_reset_restores_power_on_state() {
    let (mut cpu, _) = run(&[0x3E, 0x12, 0xFB, 0x76]);
    cpu.reset();
    assert_eq!(cpu.pc(), 0);
    assert!(!cpu.is_halted());
    assert!(!cpu.interrupts().is_enabled());
    assert_eq!(cpu.a(), 0xFF);
}

#[test]
fn test_restore_copies_snapshot_into_fresh_cpu() {
    let (cpu, _) = run(&[0x3E, 0x12, 0xED, 0x5E, 0xFB, 0x76]);
    let snapshot = cpu.snapshot();
    assert!(snapshot.iff1);
    assert!(snapshot.halted);

    let mut other = Z80::new();
    other.restore(&snapshot);
    assert_eq!(other.snapshot(), snapshot);
    assert_eq!(other.a(), 0x12);
    assert!(other.is_halted());
}
