//! Phase 1: parse source files into a flat statement list
//!
//! Reads files from the [`SourceSet`], expands `icl` includes, resolves
//! `.if`/`.elseif`/`.else`/`.endif` conditionals, and rewrites `@local`
//! labels to names scoped between global labels. Statements from skipped
//! conditional branches never reach the output, so nothing inside them is
//! evaluated and symbols defined there stay undefined.
//!
//! Conditions are evaluated against the equates seen so far in parse
//! order; a condition that references a symbol not yet defined as a
//! constant is a hard error rather than a guess.

use crate::error::{AsmError, SourceLoc};
use crate::expr::{evaluate, SymbolTable};
use crate::opcodes::is_mnemonic;
use crate::SourceSet;

/// Maximum `icl` nesting before we assume a cycle
const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub(crate) enum StmtKind {
    Label(String),
    Equate { name: String, expr: String },
    Org(String),
    Ini(String),
    Run(String),
    Byte(Vec<String>),
    Word(Vec<String>),
    Instr { mnemonic: String, operand: String },
    Error(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Stmt {
    pub kind: StmtKind,
    pub loc: SourceLoc,
}

/// Parse `main` and everything it includes into a flat statement list
pub(crate) fn parse(sources: &SourceSet, main: &str) -> Result<Vec<Stmt>, AsmError> {
    let mut p = Parser {
        sources,
        out: Vec::new(),
        cond_stack: Vec::new(),
        cond_symbols: SymbolTable::new(),
        scope: String::new(),
        depth: 0,
    };
    p.process_file(main, &SourceLoc::new("<entry>", 0))?;
    if let Some(frame) = p.cond_stack.last() {
        return Err(AsmError::ConditionalError {
            loc: frame.loc.clone(),
            message: format!("unclosed .if ({} level(s) deep)", p.cond_stack.len()),
        });
    }
    Ok(p.out)
}

struct CondFrame {
    active: bool,
    taken: bool,
    loc: SourceLoc,
}

struct Parser<'a> {
    sources: &'a SourceSet,
    out: Vec<Stmt>,
    cond_stack: Vec<CondFrame>,
    /// Constant equates seen so far, for `.if` evaluation
    cond_symbols: SymbolTable,
    /// Last global label, prefix for `@local` names
    scope: String,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn active(&self) -> bool {
        self.cond_stack.last().map_or(true, |f| f.active)
    }

    fn parent_active(&self) -> bool {
        let n = self.cond_stack.len();
        n <= 1 || self.cond_stack[n - 2].active
    }

    fn process_file(&mut self, name: &str, referrer: &SourceLoc) -> Result<(), AsmError> {
        let text = self.sources.get(name).ok_or_else(|| AsmError::IncludeNotFound {
            loc: referrer.clone(),
            name: name.to_string(),
        })?;
        if self.depth >= MAX_INCLUDE_DEPTH {
            return Err(AsmError::IncludeNotFound {
                loc: referrer.clone(),
                name: format!("{} (include depth limit, probable cycle)", name),
            });
        }

        self.depth += 1;
        // The borrow of `text` ends here; lines are owned
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        for (i, raw) in lines.iter().enumerate() {
            let stripped = strip_comment(raw);
            let trimmed = stripped.trim();
            if !trimmed.is_empty() {
                let loc = SourceLoc::new(name, (i + 1) as u32);
                self.line(trimmed, &loc)?;
            }
        }
        self.depth -= 1;
        Ok(())
    }

    fn line(&mut self, text: &str, loc: &SourceLoc) -> Result<(), AsmError> {
        let low = text.to_ascii_lowercase();

        // Conditionals run even inside inactive branches
        if let Some(cond) = dir_after(text, &low, ".if") {
            let frame = if self.active() {
                let v = self.eval_condition(cond, loc)?;
                CondFrame {
                    active: v,
                    taken: v,
                    loc: loc.clone(),
                }
            } else {
                CondFrame {
                    active: false,
                    taken: true,
                    loc: loc.clone(),
                }
            };
            self.cond_stack.push(frame);
            return Ok(());
        }
        if let Some(cond) = dir_after(text, &low, ".elseif") {
            if self.cond_stack.is_empty() {
                return Err(AsmError::ConditionalError {
                    loc: loc.clone(),
                    message: ".elseif without .if".into(),
                });
            }
            let taken = self.cond_stack.last().unwrap().taken;
            let active = if self.parent_active() && !taken {
                self.eval_condition(cond, loc)?
            } else {
                false
            };
            let frame = self.cond_stack.last_mut().unwrap();
            frame.active = active;
            frame.taken = taken || active;
            return Ok(());
        }
        if low == ".else" {
            if self.cond_stack.is_empty() {
                return Err(AsmError::ConditionalError {
                    loc: loc.clone(),
                    message: ".else without .if".into(),
                });
            }
            let parent = self.parent_active();
            let frame = self.cond_stack.last_mut().unwrap();
            frame.active = parent && !frame.taken;
            frame.taken = true;
            return Ok(());
        }
        if low == ".endif" {
            if self.cond_stack.pop().is_none() {
                return Err(AsmError::ConditionalError {
                    loc: loc.clone(),
                    message: ".endif without .if".into(),
                });
            }
            return Ok(());
        }
        if !self.active() {
            return Ok(());
        }

        // Include
        if let Some(rest) = dir_after(text, &low, "icl") {
            let name = unquote(rest).ok_or_else(|| AsmError::Syntax {
                loc: loc.clone(),
                message: "icl expects a quoted file name".into(),
            })?;
            return self.process_file(&name, loc);
        }

        // Local label: @name:
        if let Some(rest) = text.strip_prefix('@') {
            if let Some((name, tail)) = split_label(rest) {
                let mangled = format!("{}@{}", self.scope, name);
                self.out.push(Stmt {
                    kind: StmtKind::Label(mangled),
                    loc: loc.clone(),
                });
                if !tail.is_empty() {
                    return self.line(tail, loc);
                }
                return Ok(());
            }
        }

        // Global label: name:
        if let Some((name, tail)) = split_label(text) {
            self.scope = name.clone();
            self.out.push(Stmt {
                kind: StmtKind::Label(name),
                loc: loc.clone(),
            });
            if !tail.is_empty() {
                return self.line(tail, loc);
            }
            return Ok(());
        }

        // Equate: NAME = expr
        if let Some((name, expr)) = split_equate(text) {
            if !is_mnemonic(&name.to_ascii_lowercase()) {
                let expr = self.mangle(expr);
                // Constants feed later .if conditions; anything involving
                // labels or the location counter stays out of that table.
                if !expr.contains('*') {
                    if let Ok(v) = evaluate(&expr, &self.cond_symbols, 0, false) {
                        self.cond_symbols.insert(name.clone(), v);
                    }
                }
                self.out.push(Stmt {
                    kind: StmtKind::Equate { name, expr },
                    loc: loc.clone(),
                });
                return Ok(());
            }
        }

        // Simple directives
        for (tag, make) in [
            ("org", StmtKind::Org as fn(String) -> StmtKind),
            ("ini", StmtKind::Ini as fn(String) -> StmtKind),
            ("run", StmtKind::Run as fn(String) -> StmtKind),
        ] {
            if let Some(rest) = dir_after(text, &low, tag) {
                let expr = self.mangle(rest);
                self.out.push(Stmt {
                    kind: make(expr),
                    loc: loc.clone(),
                });
                return Ok(());
            }
        }
        for (tag, word) in [(".byte", false), (".word", true)] {
            if let Some(rest) = dir_after(text, &low, tag) {
                let args: Vec<String> = split_args(rest).iter().map(|a| self.mangle(a)).collect();
                if args.is_empty() {
                    return Err(AsmError::Syntax {
                        loc: loc.clone(),
                        message: format!("{} needs at least one value", tag),
                    });
                }
                self.out.push(Stmt {
                    kind: if word {
                        StmtKind::Word(args)
                    } else {
                        StmtKind::Byte(args)
                    },
                    loc: loc.clone(),
                });
                return Ok(());
            }
        }
        if let Some(rest) = dir_after(text, &low, ".error") {
            let msg = rest.trim_matches(|c| c == '"' || c == '\'').to_string();
            self.out.push(Stmt {
                kind: StmtKind::Error(msg),
                loc: loc.clone(),
            });
            return Ok(());
        }

        // Instruction
        let (head, tail) = match text.find(|c: char| c.is_ascii_whitespace()) {
            Some(i) => (&text[..i], text[i..].trim()),
            None => (text, ""),
        };
        let mnemonic = head.to_ascii_lowercase();
        if !is_mnemonic(&mnemonic) {
            return Err(AsmError::UnknownInstruction {
                loc: loc.clone(),
                name: head.to_string(),
            });
        }
        let operand = self.mangle(tail);
        self.out.push(Stmt {
            kind: StmtKind::Instr { mnemonic, operand },
            loc: loc.clone(),
        });
        Ok(())
    }

    fn eval_condition(&self, cond: &str, loc: &SourceLoc) -> Result<bool, AsmError> {
        match evaluate(cond, &self.cond_symbols, 0, true) {
            Ok(v) => Ok(v != 0),
            Err(e) => Err(AsmError::ConditionalError {
                loc: loc.clone(),
                message: format!("cannot evaluate condition '{}': {}", cond, e.at(loc)),
            }),
        }
    }

    /// Rewrite `@name` references to their scoped form
    fn mangle(&self, expr: &str) -> String {
        if !expr.contains('@') {
            return expr.to_string();
        }
        let mut out = String::with_capacity(expr.len() + 8);
        let mut prev_ident = false;
        for c in expr.chars() {
            if c == '@' && !prev_ident {
                out.push_str(&self.scope);
            }
            out.push(c);
            prev_ident = c.is_ascii_alphanumeric() || c == '_' || c == '@';
        }
        out
    }
}

// =============================================================================
// Text helpers
// =============================================================================

/// Strip a `; comment`, respecting quoted strings
fn strip_comment(line: &str) -> &str {
    let mut in_quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match in_quote {
            Some(q) => {
                if c == q {
                    in_quote = None;
                }
            }
            None => match c {
                '"' | '\'' => in_quote = Some(c),
                ';' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}

/// If the line starts with `directive` followed by whitespace or EOL,
/// return the trimmed remainder
fn dir_after<'t>(text: &'t str, low: &str, directive: &str) -> Option<&'t str> {
    if !low.starts_with(directive) {
        return None;
    }
    let rest = &text[directive.len()..];
    if rest.is_empty() {
        return Some("");
    }
    if rest.starts_with(' ') || rest.starts_with('\t') {
        Some(rest.trim())
    } else {
        None
    }
}

/// `name: rest` -> (name, rest); None if the line is not a label
fn split_label(text: &str) -> Option<(String, &str)> {
    let bytes = text.as_bytes();
    let first = *bytes.first()? as char;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let mut end = 1;
    while end < bytes.len()
        && ((bytes[end] as char).is_ascii_alphanumeric() || bytes[end] == b'_')
    {
        end += 1;
    }
    let after = text[end..].trim_start();
    if let Some(rest) = after.strip_prefix(':') {
        Some((text[..end].to_string(), rest.trim()))
    } else {
        None
    }
}

/// `NAME = expr` -> (NAME, expr); only single `=` at statement level
fn split_equate(text: &str) -> Option<(String, &str)> {
    let eq = text.find('=')?;
    let name = text[..eq].trim();
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let first = bytes[0] as char;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    let expr = text[eq + 1..].trim();
    if expr.is_empty() {
        return None;
    }
    Some((name.to_string(), expr))
}

/// Split comma-separated arguments, respecting parentheses
fn split_args(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                let piece = s[start..i].trim();
                if !piece.is_empty() {
                    parts.push(piece);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

/// Extract a 'quoted' or "quoted" file name
fn unquote(s: &str) -> Option<String> {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let q = bytes[0];
        if (q == b'\'' || q == b'"') && bytes[bytes.len() - 1] == q {
            return Some(s[1..s.len() - 1].to_string());
        }
    }
    None
}
