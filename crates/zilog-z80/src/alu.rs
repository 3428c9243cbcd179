//! ALU operations for the Z80.
//!
//! Every function is pure: it takes operands (and the incoming carry where
//! relevant) and returns the result with a complete flag byte, undocumented
//! X/Y bits included.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, flag_if, sz53, sz53p};

/// Result of an ALU operation with flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

/// Add two bytes with optional carry, returning result and flags.
#[must_use]
pub fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let wide = u16::from(a) + u16::from(b) + u16::from(c);
    let result = wide as u8;

    // Overflow: both operands same sign, result different sign.
    let overflow = (a ^ b) & 0x80 == 0 && (a ^ result) & 0x80 != 0;
    let flags = sz53(result)
        | flag_if((a & 0x0F) + (b & 0x0F) + c > 0x0F, HF)
        | flag_if(overflow, PF)
        | flag_if(wide > 0xFF, CF);

    AluResult { value: result, flags }
}

/// Subtract two bytes with optional borrow, returning result and flags.
#[must_use]
pub fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = u8::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    // Overflow: operands differ in sign and the result took the subtrahend's.
    let overflow = (a ^ b) & 0x80 != 0 && (b ^ result) & 0x80 == 0;
    let flags = NF
        | sz53(result)
        | flag_if((a & 0x0F) < (b & 0x0F) + c, HF)
        | flag_if(overflow, PF)
        | flag_if(u16::from(a) < u16::from(b) + u16::from(c), CF);

    AluResult { value: result, flags }
}

#[must_use]
pub fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult {
        value,
        flags: sz53p(value) | HF,
    }
}

#[must_use]
pub fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult {
        value,
        flags: sz53p(value),
    }
}

#[must_use]
pub fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult {
        value,
        flags: sz53p(value),
    }
}

/// Compare (subtract without storing result). X/Y come from the operand.
#[must_use]
pub fn cp8(a: u8, b: u8) -> AluResult {
    let diff = sub8(a, b, false);
    AluResult {
        value: a,
        flags: (diff.flags & !(YF | XF)) | (b & (YF | XF)),
    }
}

/// Dispatch one of the eight accumulator operations by its 3-bit opcode
/// field: ADD ADC SUB SBC AND XOR OR CP.
#[must_use]
pub fn accumulate(op: u8, a: u8, b: u8, carry: bool) -> AluResult {
    match op & 7 {
        0 => add8(a, b, false),
        1 => add8(a, b, carry),
        2 => sub8(a, b, false),
        3 => sub8(a, b, carry),
        4 => and8(a, b),
        5 => xor8(a, b),
        6 => or8(a, b),
        _ => cp8(a, b),
    }
}

/// Increment byte. Carry is not affected; callers merge it back in.
#[must_use]
pub fn inc8(a: u8) -> AluResult {
    let value = a.wrapping_add(1);
    AluResult {
        value,
        flags: sz53(value) | flag_if(a & 0x0F == 0x0F, HF) | flag_if(a == 0x7F, PF),
    }
}

/// Decrement byte. Carry is not affected; callers merge it back in.
#[must_use]
pub fn dec8(a: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    AluResult {
        value,
        flags: NF | sz53(value) | flag_if(a & 0x0F == 0x00, HF) | flag_if(a == 0x80, PF),
    }
}

/// CB-prefixed rotate and shift group, selected by the 3-bit opcode field:
/// RLC RRC RL RR SLA SRA SLL SRL. SLL is undocumented and shifts a 1 into
/// bit 0.
#[must_use]
pub fn rotate_shift(op: u8, a: u8, carry: bool) -> AluResult {
    let (value, carry_out) = match op & 7 {
        0 => (a.rotate_left(1), a & 0x80 != 0),
        1 => (a.rotate_right(1), a & 0x01 != 0),
        2 => ((a << 1) | u8::from(carry), a & 0x80 != 0),
        3 => ((a >> 1) | (u8::from(carry) << 7), a & 0x01 != 0),
        4 => (a << 1, a & 0x80 != 0),
        5 => ((a >> 1) | (a & 0x80), a & 0x01 != 0),
        6 => ((a << 1) | 1, a & 0x80 != 0),
        _ => (a >> 1, a & 0x01 != 0),
    };
    AluResult {
        value,
        flags: sz53p(value) | flag_if(carry_out, CF),
    }
}

/// Decimal-adjust the accumulator after BCD addition or subtraction.
#[must_use]
pub fn daa(a: u8, f: u8) -> AluResult {
    let nf = f & NF != 0;
    let cf = f & CF != 0;
    let hf = f & HF != 0;

    let mut correction = 0;
    if hf || (a & 0x0F) > 9 {
        correction |= 0x06;
    }
    let carry = cf || a > 0x99;
    if carry {
        correction |= 0x60;
    }

    let value = if nf {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };

    // After addition H is set when the low nibble overflowed; after
    // subtraction when the old half-borrow survives the adjust.
    let half = if nf {
        hf && (a & 0x0F) < 6
    } else {
        (a & 0x0F) > 9
    };

    AluResult {
        value,
        flags: sz53p(value) | (f & NF) | flag_if(carry, CF) | flag_if(half, HF),
    }
}

/// 16-bit add for HL/IX/IY. Only H, C and X/Y change; S, Z and P/V are
/// left to the caller.
#[must_use]
pub fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = u32::from(a) + u32::from(b);
    let result = wide as u16;

    let flags = (((result >> 8) as u8) & (YF | XF))
        | flag_if((a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF, HF)
        | flag_if(wide > 0xFFFF, CF);

    (result, flags)
}

/// 16-bit add with carry for HL.
#[must_use]
pub fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let wide = u32::from(a) + u32::from(b) + u32::from(c);
    let result = wide as u16;

    let overflow = (a ^ b) & 0x8000 == 0 && (a ^ result) & 0x8000 != 0;
    let flags = flag_if(result & 0x8000 != 0, SF)
        | flag_if(result == 0, ZF)
        | (((result >> 8) as u8) & (YF | XF))
        | flag_if((a & 0x0FFF) + (b & 0x0FFF) + c > 0x0FFF, HF)
        | flag_if(overflow, PF)
        | flag_if(wide > 0xFFFF, CF);

    (result, flags)
}

/// 16-bit subtract with borrow for HL.
#[must_use]
pub fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = u16::from(carry);
    let result = a.wrapping_sub(b).wrapping_sub(c);

    let overflow = (a ^ b) & 0x8000 != 0 && (b ^ result) & 0x8000 == 0;
    let flags = NF
        | flag_if(result & 0x8000 != 0, SF)
        | flag_if(result == 0, ZF)
        | (((result >> 8) as u8) & (YF | XF))
        | flag_if((a & 0x0FFF) < (b & 0x0FFF) + c, HF)
        | flag_if(overflow, PF)
        | flag_if(u32::from(a) < u32::from(b) + u32::from(c), CF);

    (result, flags)
}
