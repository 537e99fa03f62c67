//! Two-pass assembly: layout then emit
//!
//! Pass 1 walks the parsed statements once, assigning every label an
//! address and freezing every instruction's addressing mode and width.
//! Pass 2 re-walks with the completed symbol table, evaluates every
//! expression, and encodes bytes into segments. The pass-1 result is an
//! immutable snapshot; nothing in pass 2 can move an address.

use tracing::debug;

use crate::encoder::{encode_instruction, plan_instruction, InstrPlan};
use crate::error::{AsmError, SourceLoc};
use crate::expr::{evaluate, SymbolTable};
use crate::parser::{parse, Stmt, StmtKind};
use crate::xex::{build_xex, init_segment, Segment};
use crate::SourceSet;

/// Assemble `main_file` from the source set into an XEX byte stream
pub fn assemble(sources: &SourceSet, main_file: &str) -> Result<Vec<u8>, AsmError> {
    let (segments, run_addr) = assemble_segments(sources, main_file)?;
    Ok(build_xex(&segments, run_addr))
}

/// Assemble to raw segments plus the RUN address, for callers that want
/// to inspect or post-process the layout
pub fn assemble_segments(
    sources: &SourceSet,
    main_file: &str,
) -> Result<(Vec<Segment>, Option<u16>), AsmError> {
    let stmts = parse(sources, main_file)?;
    let layout = layout_pass(&stmts)?;
    debug!(
        statements = stmts.len(),
        symbols = layout.symbols.len(),
        "layout complete"
    );
    emit_pass(&stmts, layout)
}

/// Immutable output of pass 1
struct Layout {
    symbols: SymbolTable,
    /// Frozen instruction plans, indexed by statement position
    plans: Vec<Option<InstrPlan>>,
}

fn layout_pass(stmts: &[Stmt]) -> Result<Layout, AsmError> {
    let mut symbols = SymbolTable::new();
    let mut label_names: Vec<String> = Vec::new();
    let mut plans: Vec<Option<InstrPlan>> = vec![None; stmts.len()];
    let mut pc: u16 = 0;

    for (i, stmt) in stmts.iter().enumerate() {
        let loc = &stmt.loc;
        match &stmt.kind {
            StmtKind::Label(name) => {
                if symbols.contains_key(name) {
                    return Err(AsmError::DuplicateLabel {
                        loc: loc.clone(),
                        name: name.clone(),
                    });
                }
                symbols.insert(name.clone(), i64::from(pc));
                label_names.push(name.clone());
            }
            StmtKind::Equate { name, expr } => {
                if label_names.iter().any(|l| l == name) {
                    return Err(AsmError::DuplicateLabel {
                        loc: loc.clone(),
                        name: name.clone(),
                    });
                }
                match evaluate(expr, &symbols, pc, false) {
                    Ok(v) => {
                        symbols.insert(name.clone(), v & 0xFFFF);
                    }
                    // Forward reference: pass 2 sees the full table
                    Err(crate::error::ExprError::Undefined(_)) => {}
                    Err(e) => return Err(e.at(loc)),
                }
            }
            StmtKind::Org(expr) => {
                let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                pc = (v & 0xFFFF) as u16;
            }
            StmtKind::Ini(_) | StmtKind::Run(_) => {}
            StmtKind::Byte(exprs) => {
                pc = pc.wrapping_add(exprs.len() as u16);
            }
            StmtKind::Word(exprs) => {
                pc = pc.wrapping_add(2 * exprs.len() as u16);
            }
            StmtKind::Instr { mnemonic, operand } => {
                let plan = plan_instruction(mnemonic, operand, &symbols, pc, loc)?;
                pc = pc.wrapping_add(plan.size());
                plans[i] = Some(plan);
            }
            StmtKind::Error(message) => {
                return Err(AsmError::UserError {
                    loc: loc.clone(),
                    message: message.clone(),
                });
            }
        }
    }

    Ok(Layout { symbols, plans })
}

fn emit_pass(stmts: &[Stmt], layout: Layout) -> Result<(Vec<Segment>, Option<u16>), AsmError> {
    let Layout { mut symbols, plans } = layout;

    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Option<Segment> = None;
    let mut run_addr: Option<u16> = None;
    let mut pc: u16 = 0;

    let close = |segments: &mut Vec<Segment>, current: &mut Option<Segment>| {
        if let Some(seg) = current.take() {
            if !seg.data.is_empty() {
                segments.push(seg);
            }
        }
    };

    for (i, stmt) in stmts.iter().enumerate() {
        let loc = &stmt.loc;
        match &stmt.kind {
            StmtKind::Label(_) => {}
            StmtKind::Equate { name, expr } => {
                let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                symbols.insert(name.clone(), v & 0xFFFF);
            }
            StmtKind::Org(expr) => {
                close(&mut segments, &mut current);
                let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                pc = (v & 0xFFFF) as u16;
            }
            StmtKind::Ini(expr) => {
                close(&mut segments, &mut current);
                let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                segments.push(init_segment((v & 0xFFFF) as u16));
            }
            StmtKind::Run(expr) => {
                let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                run_addr = Some((v & 0xFFFF) as u16);
            }
            StmtKind::Byte(exprs) => {
                for expr in exprs {
                    let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                    put(&mut current, &mut pc, &[(v & 0xFF) as u8]);
                }
            }
            StmtKind::Word(exprs) => {
                for expr in exprs {
                    let v = evaluate(expr, &symbols, pc, false).map_err(|e| e.at(loc))?;
                    put(&mut current, &mut pc, &((v & 0xFFFF) as u16).to_le_bytes());
                }
            }
            StmtKind::Instr { .. } => {
                let plan = plans[i].as_ref().expect("instruction without plan");
                let bytes = encode_instruction(plan, &symbols, pc, loc)?;
                put(&mut current, &mut pc, &bytes);
            }
            StmtKind::Error(message) => {
                return Err(AsmError::UserError {
                    loc: loc.clone(),
                    message: message.clone(),
                });
            }
        }
    }

    close(&mut segments, &mut current);
    Ok((segments, run_addr))
}

fn put(current: &mut Option<Segment>, pc: &mut u16, bytes: &[u8]) {
    let seg = current.get_or_insert_with(|| Segment::new(*pc));
    seg.data.extend_from_slice(bytes);
    *pc = pc.wrapping_add(bytes.len() as u16);
}
