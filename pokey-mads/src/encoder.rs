//! Operand classification, addressing-mode resolution, and byte encoding
//!
//! Pass 1 calls [`plan_instruction`] to fix each instruction's mode and
//! width; pass 2 calls [`encode_instruction`] with the frozen plan. An
//! operand that resolves during pass 1 takes the smallest valid mode
//! (zero page when the value fits a byte and the mnemonic has that form);
//! a forward reference is pinned to absolute so addresses cannot shift
//! between passes.

use crate::error::{AsmError, ExprError, SourceLoc};
use crate::expr::{evaluate, SymbolTable};
use crate::opcodes::{is_branch, is_shift, opcode, Mode};

/// Syntactic shape of an operand, before mode resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    Implied,
    Accumulator,
    Immediate(String),
    Indirect(String),
    IndirectX(String),
    IndirectY(String),
    IndexedX(String),
    IndexedY(String),
    Relative(String),
    Direct(String),
}

/// An instruction's frozen encoding decision
#[derive(Debug, Clone)]
pub(crate) struct InstrPlan {
    pub mode: Mode,
    pub opcode: u8,
    pub expr: Option<String>,
}

impl InstrPlan {
    pub(crate) fn size(&self) -> u16 {
        self.mode.size()
    }
}

/// Classify an operand string
pub(crate) fn parse_operand(operand: &str, mnemonic: &str) -> Operand {
    let t = operand.trim();

    if t.is_empty() {
        return if is_shift(mnemonic) {
            Operand::Accumulator
        } else {
            Operand::Implied
        };
    }
    if t.eq_ignore_ascii_case("a") && is_shift(mnemonic) {
        return Operand::Accumulator;
    }
    if let Some(rest) = t.strip_prefix('#') {
        return Operand::Immediate(rest.trim().to_string());
    }

    if let Some((head, tail)) = split_last_top_comma(t) {
        let head = head.trim();
        let tail = tail.trim();
        if tail.eq_ignore_ascii_case("y") {
            if let Some(inner) = fully_parenthesized(head) {
                return Operand::IndirectY(inner.trim().to_string());
            }
            return Operand::IndexedY(head.to_string());
        }
        if tail.eq_ignore_ascii_case("x") {
            return Operand::IndexedX(head.to_string());
        }
        // Unknown index register: fall through and let the expression
        // evaluator report the stray comma
        return Operand::Direct(t.to_string());
    }

    if let Some(inner) = fully_parenthesized(t) {
        if let Some((head, tail)) = split_last_top_comma(inner) {
            if tail.trim().eq_ignore_ascii_case("x") {
                return Operand::IndirectX(head.trim().to_string());
            }
        }
        return Operand::Indirect(inner.trim().to_string());
    }

    if is_branch(mnemonic) {
        return Operand::Relative(t.to_string());
    }
    Operand::Direct(t.to_string())
}

/// Decide the addressing mode and width for one instruction (pass 1)
pub(crate) fn plan_instruction(
    mnemonic: &str,
    operand: &str,
    symbols: &SymbolTable,
    pc: u16,
    loc: &SourceLoc,
) -> Result<InstrPlan, AsmError> {
    let shape = parse_operand(operand, mnemonic);

    let fixed = |mode: Mode, expr: Option<String>| -> Result<InstrPlan, AsmError> {
        match opcode(mnemonic, mode) {
            Some(op) => Ok(InstrPlan {
                mode,
                opcode: op,
                expr,
            }),
            None => Err(AsmError::BadAddressingMode {
                loc: loc.clone(),
                mnemonic: mnemonic.to_string(),
                mode: mode.name(),
            }),
        }
    };

    match shape {
        Operand::Implied => fixed(Mode::Imp, None),
        Operand::Accumulator => fixed(Mode::Acc, None),
        Operand::Immediate(e) => fixed(Mode::Imm, Some(e)),
        Operand::Indirect(e) => fixed(Mode::Ind, Some(e)),
        Operand::IndirectX(e) => fixed(Mode::Izx, Some(e)),
        Operand::IndirectY(e) => fixed(Mode::Izy, Some(e)),
        Operand::Relative(e) => fixed(Mode::Rel, Some(e)),
        Operand::Direct(e) => narrow(mnemonic, e, Mode::Zp, Mode::Abs, symbols, pc, loc),
        Operand::IndexedX(e) => narrow(mnemonic, e, Mode::Zpx, Mode::Abx, symbols, pc, loc),
        Operand::IndexedY(e) => narrow(mnemonic, e, Mode::Zpy, Mode::Aby, symbols, pc, loc),
    }
}

/// Zero-page vs absolute decision
fn narrow(
    mnemonic: &str,
    expr: String,
    zp: Mode,
    abs: Mode,
    symbols: &SymbolTable,
    pc: u16,
    loc: &SourceLoc,
) -> Result<InstrPlan, AsmError> {
    let known = match evaluate(&expr, symbols, pc, false) {
        Ok(v) => Some(v),
        Err(ExprError::Undefined(_)) => None, // forward reference: absolute
        Err(e) => return Err(e.at(loc)),
    };

    if let Some(v) = known {
        let addr = (v & 0xFFFF) as u16;
        if addr <= 0xFF {
            if let Some(op) = opcode(mnemonic, zp) {
                return Ok(InstrPlan {
                    mode: zp,
                    opcode: op,
                    expr: Some(expr),
                });
            }
        }
    }

    match opcode(mnemonic, abs) {
        Some(op) => Ok(InstrPlan {
            mode: abs,
            opcode: op,
            expr: Some(expr),
        }),
        None => Err(AsmError::BadAddressingMode {
            loc: loc.clone(),
            mnemonic: mnemonic.to_string(),
            mode: abs.name(),
        }),
    }
}

/// Encode one instruction with its frozen plan (pass 2)
pub(crate) fn encode_instruction(
    plan: &InstrPlan,
    symbols: &SymbolTable,
    pc: u16,
    loc: &SourceLoc,
) -> Result<Vec<u8>, AsmError> {
    let value = match &plan.expr {
        Some(e) => evaluate(e, symbols, pc, false).map_err(|err| err.at(loc))?,
        None => 0,
    };
    let addr = (value & 0xFFFF) as u16;

    let bytes = match plan.mode {
        Mode::Imp | Mode::Acc => vec![plan.opcode],
        Mode::Imm | Mode::Zp | Mode::Zpx | Mode::Zpy | Mode::Izx | Mode::Izy => {
            vec![plan.opcode, (value & 0xFF) as u8]
        }
        Mode::Abs | Mode::Abx | Mode::Aby | Mode::Ind => {
            vec![plan.opcode, (addr & 0xFF) as u8, (addr >> 8) as u8]
        }
        Mode::Rel => {
            let offset = i32::from(addr) - (i32::from(pc) + 2);
            if !(-128..=127).contains(&offset) {
                return Err(AsmError::BranchOutOfRange {
                    loc: loc.clone(),
                    offset,
                });
            }
            vec![plan.opcode, (offset as i8) as u8]
        }
    };
    Ok(bytes)
}

// =============================================================================
// String scanning
// =============================================================================

/// Split at the last comma outside parentheses
fn split_last_top_comma(s: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut pos = None;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => pos = Some(i),
            _ => {}
        }
    }
    pos.map(|i| (&s[..i], &s[i + 1..]))
}

/// If the whole string is one parenthesized group, return the inside
fn fully_parenthesized(s: &str) -> Option<&str> {
    if !s.starts_with('(') || !s.ends_with(')') || s.len() < 2 {
        return None;
    }
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && i != s.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        Some(&s[1..s.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(s: &str, mn: &str) -> Operand {
        parse_operand(s, mn)
    }

    #[test]
    fn test_operand_shapes() {
        assert_eq!(op("", "rts"), Operand::Implied);
        assert_eq!(op("", "lsr"), Operand::Accumulator);
        assert_eq!(op("a", "asl"), Operand::Accumulator);
        assert_eq!(op("#$10", "lda"), Operand::Immediate("$10".into()));
        assert_eq!(op("(lz_src),y", "lda"), Operand::IndirectY("lz_src".into()));
        assert_eq!(op("(tab,x)", "lda"), Operand::IndirectX("tab".into()));
        assert_eq!(op("(vector)", "jmp"), Operand::Indirect("vector".into()));
        assert_eq!(op("tab,x", "lda"), Operand::IndexedX("tab".into()));
        assert_eq!(op("tab , Y", "lda"), Operand::IndexedY("tab".into()));
        assert_eq!(op("loop", "bne"), Operand::Relative("loop".into()));
        assert_eq!(op("$D301", "sta"), Operand::Direct("$D301".into()));
        // Arithmetic in parens is not an indirect jump target
        assert_eq!(op("(2+3)*4", "lda"), Operand::Direct("(2+3)*4".into()));
    }

    #[test]
    fn test_zero_page_narrowing() {
        let mut syms = SymbolTable::new();
        syms.insert("zp_ptr".into(), 0x80);
        syms.insert("hw_reg".into(), 0xD301);
        let loc = SourceLoc::new("t", 1);

        let plan = plan_instruction("lda", "zp_ptr", &syms, 0, &loc).unwrap();
        assert_eq!(plan.mode, Mode::Zp);
        assert_eq!(plan.size(), 2);

        let plan = plan_instruction("lda", "hw_reg", &syms, 0, &loc).unwrap();
        assert_eq!(plan.mode, Mode::Abs);

        // Forward reference pins absolute even if it later lands < 256
        let plan = plan_instruction("lda", "later", &syms, 0, &loc).unwrap();
        assert_eq!(plan.mode, Mode::Abs);
    }

    #[test]
    fn test_zpy_fallback_to_aby() {
        // lda has no zp,Y form, so a small operand still encodes absolute,Y
        let mut syms = SymbolTable::new();
        syms.insert("p".into(), 0x10);
        let loc = SourceLoc::new("t", 1);
        let plan = plan_instruction("lda", "p,y", &syms, 0, &loc).unwrap();
        assert_eq!(plan.mode, Mode::Aby);
        // ldx does have zp,Y
        let plan = plan_instruction("ldx", "p,y", &syms, 0, &loc).unwrap();
        assert_eq!(plan.mode, Mode::Zpy);
    }

    #[test]
    fn test_bad_mode() {
        let loc = SourceLoc::new("t", 1);
        let err = plan_instruction("sta", "#5", &SymbolTable::new(), 0, &loc).unwrap_err();
        assert!(matches!(err, AsmError::BadAddressingMode { .. }));
    }

    #[test]
    fn test_branch_encoding() {
        let loc = SourceLoc::new("t", 1);
        let mut syms = SymbolTable::new();
        syms.insert("target".into(), 0x2005);
        let plan = plan_instruction("bne", "target", &syms, 0x2000, &loc).unwrap();
        let bytes = encode_instruction(&plan, &syms, 0x2000, &loc).unwrap();
        assert_eq!(bytes, vec![0xD0, 0x03]);

        // Backward branch
        syms.insert("back".into(), 0x1FF0);
        let plan = plan_instruction("bne", "back", &syms, 0x2000, &loc).unwrap();
        let bytes = encode_instruction(&plan, &syms, 0x2000, &loc).unwrap();
        assert_eq!(bytes, vec![0xD0, 0xEE]);
    }

    #[test]
    fn test_branch_range_limits() {
        let loc = SourceLoc::new("t", 1);
        let mut syms = SymbolTable::new();
        // +127 is the limit: target = pc + 2 + 127
        syms.insert("edge".into(), 0x2000 + 2 + 127);
        let plan = plan_instruction("beq", "edge", &syms, 0x2000, &loc).unwrap();
        assert!(encode_instruction(&plan, &syms, 0x2000, &loc).is_ok());

        syms.insert("far".into(), 0x2000 + 2 + 128);
        let plan = plan_instruction("beq", "far", &syms, 0x2000, &loc).unwrap();
        let err = encode_instruction(&plan, &syms, 0x2000, &loc).unwrap_err();
        assert!(matches!(err, AsmError::BranchOutOfRange { offset: 128, .. }));
    }

    #[test]
    fn test_immediate_lo_hi() {
        let loc = SourceLoc::new("t", 1);
        let mut syms = SymbolTable::new();
        syms.insert("irq_handler".into(), 0x2345);
        let plan = plan_instruction("lda", "#<irq_handler", &syms, 0, &loc).unwrap();
        assert_eq!(
            encode_instruction(&plan, &syms, 0, &loc).unwrap(),
            vec![0xA9, 0x45]
        );
        let plan = plan_instruction("lda", "#>irq_handler", &syms, 0, &loc).unwrap();
        assert_eq!(
            encode_instruction(&plan, &syms, 0, &loc).unwrap(),
            vec![0xA9, 0x23]
        );
    }
}
