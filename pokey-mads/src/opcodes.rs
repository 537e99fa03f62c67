//! 6502 opcode table
//!
//! The full documented instruction set (56 mnemonics). Undocumented
//! opcodes are deliberately absent; the player never uses them and MADS
//! only emits them behind options this dialect does not implement.

/// Addressing modes of the documented 6502
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Imp,
    Acc,
    Imm,
    Zp,
    Zpx,
    Zpy,
    Abs,
    Abx,
    Aby,
    Ind,
    Izx,
    Izy,
    Rel,
}

impl Mode {
    /// Instruction length in bytes for this mode
    pub fn size(self) -> u16 {
        match self {
            Mode::Imp | Mode::Acc => 1,
            Mode::Imm | Mode::Zp | Mode::Zpx | Mode::Zpy | Mode::Izx | Mode::Izy | Mode::Rel => 2,
            Mode::Abs | Mode::Abx | Mode::Aby | Mode::Ind => 3,
        }
    }

    /// Human name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Mode::Imp => "implied",
            Mode::Acc => "accumulator",
            Mode::Imm => "immediate",
            Mode::Zp => "zero-page",
            Mode::Zpx => "zero-page,X",
            Mode::Zpy => "zero-page,Y",
            Mode::Abs => "absolute",
            Mode::Abx => "absolute,X",
            Mode::Aby => "absolute,Y",
            Mode::Ind => "indirect",
            Mode::Izx => "(indirect,X)",
            Mode::Izy => "(indirect),Y",
            Mode::Rel => "relative",
        }
    }
}

/// True for the relative-branch mnemonics
pub fn is_branch(mnemonic: &str) -> bool {
    matches!(
        mnemonic,
        "bcc" | "bcs" | "beq" | "bmi" | "bne" | "bpl" | "bvc" | "bvs"
    )
}

/// True for the read-modify-write shifts that accept accumulator mode
pub fn is_shift(mnemonic: &str) -> bool {
    matches!(mnemonic, "asl" | "lsr" | "rol" | "ror")
}

/// True if `s` (lowercase) is a known mnemonic
pub fn is_mnemonic(s: &str) -> bool {
    opcode(s, Mode::Imp).is_some()
        || opcode(s, Mode::Imm).is_some()
        || opcode(s, Mode::Zp).is_some()
        || opcode(s, Mode::Abs).is_some()
        || opcode(s, Mode::Rel).is_some()
        || opcode(s, Mode::Acc).is_some()
}

/// Opcode byte for a (mnemonic, mode) pair, if the combination exists
///
/// Mnemonics are lowercase.
pub fn opcode(mnemonic: &str, mode: Mode) -> Option<u8> {
    use Mode::*;
    let op = match (mnemonic, mode) {
        ("adc", Imm) => 0x69, ("adc", Zp) => 0x65, ("adc", Zpx) => 0x75,
        ("adc", Abs) => 0x6D, ("adc", Abx) => 0x7D, ("adc", Aby) => 0x79,
        ("adc", Izx) => 0x61, ("adc", Izy) => 0x71,

        ("and", Imm) => 0x29, ("and", Zp) => 0x25, ("and", Zpx) => 0x35,
        ("and", Abs) => 0x2D, ("and", Abx) => 0x3D, ("and", Aby) => 0x39,
        ("and", Izx) => 0x21, ("and", Izy) => 0x31,

        ("asl", Acc) => 0x0A, ("asl", Zp) => 0x06, ("asl", Zpx) => 0x16,
        ("asl", Abs) => 0x0E, ("asl", Abx) => 0x1E,

        ("bcc", Rel) => 0x90, ("bcs", Rel) => 0xB0, ("beq", Rel) => 0xF0,
        ("bmi", Rel) => 0x30, ("bne", Rel) => 0xD0, ("bpl", Rel) => 0x10,
        ("bvc", Rel) => 0x50, ("bvs", Rel) => 0x70,

        ("bit", Zp) => 0x24, ("bit", Abs) => 0x2C,

        ("brk", Imp) => 0x00,
        ("clc", Imp) => 0x18, ("cld", Imp) => 0xD8, ("cli", Imp) => 0x58,
        ("clv", Imp) => 0xB8,

        ("cmp", Imm) => 0xC9, ("cmp", Zp) => 0xC5, ("cmp", Zpx) => 0xD5,
        ("cmp", Abs) => 0xCD, ("cmp", Abx) => 0xDD, ("cmp", Aby) => 0xD9,
        ("cmp", Izx) => 0xC1, ("cmp", Izy) => 0xD1,

        ("cpx", Imm) => 0xE0, ("cpx", Zp) => 0xE4, ("cpx", Abs) => 0xEC,
        ("cpy", Imm) => 0xC0, ("cpy", Zp) => 0xC4, ("cpy", Abs) => 0xCC,

        ("dec", Zp) => 0xC6, ("dec", Zpx) => 0xD6, ("dec", Abs) => 0xCE,
        ("dec", Abx) => 0xDE,
        ("dex", Imp) => 0xCA, ("dey", Imp) => 0x88,

        ("eor", Imm) => 0x49, ("eor", Zp) => 0x45, ("eor", Zpx) => 0x55,
        ("eor", Abs) => 0x4D, ("eor", Abx) => 0x5D, ("eor", Aby) => 0x59,
        ("eor", Izx) => 0x41, ("eor", Izy) => 0x51,

        ("inc", Zp) => 0xE6, ("inc", Zpx) => 0xF6, ("inc", Abs) => 0xEE,
        ("inc", Abx) => 0xFE,
        ("inx", Imp) => 0xE8, ("iny", Imp) => 0xC8,

        ("jmp", Abs) => 0x4C, ("jmp", Ind) => 0x6C,
        ("jsr", Abs) => 0x20,

        ("lda", Imm) => 0xA9, ("lda", Zp) => 0xA5, ("lda", Zpx) => 0xB5,
        ("lda", Abs) => 0xAD, ("lda", Abx) => 0xBD, ("lda", Aby) => 0xB9,
        ("lda", Izx) => 0xA1, ("lda", Izy) => 0xB1,

        ("ldx", Imm) => 0xA2, ("ldx", Zp) => 0xA6, ("ldx", Zpy) => 0xB6,
        ("ldx", Abs) => 0xAE, ("ldx", Aby) => 0xBE,

        ("ldy", Imm) => 0xA0, ("ldy", Zp) => 0xA4, ("ldy", Zpx) => 0xB4,
        ("ldy", Abs) => 0xAC, ("ldy", Abx) => 0xBC,

        ("lsr", Acc) => 0x4A, ("lsr", Zp) => 0x46, ("lsr", Zpx) => 0x56,
        ("lsr", Abs) => 0x4E, ("lsr", Abx) => 0x5E,

        ("nop", Imp) => 0xEA,

        ("ora", Imm) => 0x09, ("ora", Zp) => 0x05, ("ora", Zpx) => 0x15,
        ("ora", Abs) => 0x0D, ("ora", Abx) => 0x1D, ("ora", Aby) => 0x19,
        ("ora", Izx) => 0x01, ("ora", Izy) => 0x11,

        ("pha", Imp) => 0x48, ("php", Imp) => 0x08,
        ("pla", Imp) => 0x68, ("plp", Imp) => 0x28,

        ("rol", Acc) => 0x2A, ("rol", Zp) => 0x26, ("rol", Zpx) => 0x36,
        ("rol", Abs) => 0x2E, ("rol", Abx) => 0x3E,
        ("ror", Acc) => 0x6A, ("ror", Zp) => 0x66, ("ror", Zpx) => 0x76,
        ("ror", Abs) => 0x6E, ("ror", Abx) => 0x7E,

        ("rti", Imp) => 0x40, ("rts", Imp) => 0x60,

        ("sbc", Imm) => 0xE9, ("sbc", Zp) => 0xE5, ("sbc", Zpx) => 0xF5,
        ("sbc", Abs) => 0xED, ("sbc", Abx) => 0xFD, ("sbc", Aby) => 0xF9,
        ("sbc", Izx) => 0xE1, ("sbc", Izy) => 0xF1,

        ("sec", Imp) => 0x38, ("sed", Imp) => 0xF8, ("sei", Imp) => 0x78,

        ("sta", Zp) => 0x85, ("sta", Zpx) => 0x95, ("sta", Abs) => 0x8D,
        ("sta", Abx) => 0x9D, ("sta", Aby) => 0x99, ("sta", Izx) => 0x81,
        ("sta", Izy) => 0x91,

        ("stx", Zp) => 0x86, ("stx", Zpy) => 0x96, ("stx", Abs) => 0x8E,
        ("sty", Zp) => 0x84, ("sty", Zpx) => 0x94, ("sty", Abs) => 0x8C,

        ("tax", Imp) => 0xAA, ("tay", Imp) => 0xA8, ("tsx", Imp) => 0xBA,
        ("txa", Imp) => 0x8A, ("txs", Imp) => 0x9A, ("tya", Imp) => 0x98,

        _ => return None,
    };
    Some(op)
}
