//! Generated assembly fragments
//!
//! Everything the static player `icl`-includes by name comes from here:
//! per-song constants, AUDC lookup tables, VQ address tables, the PORTB
//! placeholder, splash text, and the bank data plus its loader stubs.
//! All fragments are pure data or trivial stubs; the player source owns
//! every piece of control flow.

use std::fmt::Write as _;

use pokey_codec::{BANK_BASE, BANK_SIZE};
use pokey_dsp::LevelTable;
use pokey_mads::SourceSet;

use crate::config::Compression;
use crate::player;
use crate::splash::{center, format_info_line, to_screen_codes};

/// Master file name; assembly starts here
pub const MAIN_FILE: &str = "stream_player.asm";

/// Inputs to fragment generation
pub struct ProjectParams<'a> {
    pub banks: &'a [Vec<u8>],
    pub compression: Compression,
    pub divisor: u8,
    pub audctl: u8,
    pub actual_rate: f64,
    pub table: &'a LevelTable,
    pub vec_size: usize,
    /// LZ stream carries packed channel/volume bytes instead of level
    /// indices (1cps mode)
    pub lz_1cps: bool,
    /// Encoded play time in seconds, for the banner comments
    pub duration_secs: f64,
}

impl Compression {
    /// COMPRESS_MODE constant understood by the player
    pub(crate) fn mode_int(self) -> u8 {
        match self {
            Compression::Off => 0,
            Compression::Lz => 1,
            Compression::Vq => 2,
        }
    }

    fn mode_name(self) -> &'static str {
        match self {
            Compression::Off => "RAW",
            Compression::Lz => "DeltaLZ",
            Compression::Vq => "VQ",
        }
    }
}

/// Build the complete source set: generated fragments + static player
pub fn generate_sources(params: &ProjectParams<'_>) -> SourceSet {
    let mut sources = SourceSet::new();

    for (name, text) in player::player_sources() {
        sources.insert(*name, *text);
    }

    sources.insert("config.asm", config_asm(params));
    sources.insert("audc_tables.asm", audc_tables_asm(params.table, params.lz_1cps));
    sources.insert("portb_table.asm", portb_table_asm());
    sources.insert("splash_data.asm", splash_data_asm(params));
    sources.insert("banks.asm", banks_asm(params.banks.len()));
    for (i, bank) in params.banks.iter().enumerate() {
        sources.insert(format!("bank_{:02}.asm", i), bank_asm(i, bank));
    }
    if params.compression == Compression::Vq {
        sources.insert("vq_tables.asm", vq_tables_asm(params.vec_size));
    }

    sources
}

fn banner(out: &mut String, name: &str, what: &str) {
    let rule = "; ".to_string() + &"=".repeat(74);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "; {} -- {} (generated)", name, what);
    let _ = writeln!(out, "{}", rule);
}

fn config_asm(p: &ProjectParams<'_>) -> String {
    let clk = if p.audctl & 0x40 != 0 {
        "1.79MHz ch1"
    } else {
        "64kHz base"
    };
    let dur = p.duration_secs.max(0.0) as u64;
    let n_banks = p.banks.len();

    let mut out = String::new();
    banner(&mut out, "config.asm", "per-song constants");
    let _ = writeln!(out, "; Mode: {}, {}ch", p.compression.mode_name(), p.table.channels());
    let _ = writeln!(
        out,
        "; Rate: {:.1} Hz (divisor ${:02X}, {})",
        p.actual_rate, p.divisor, clk
    );
    let _ = writeln!(out, "; Duration: {}:{:02}", dur / 60, dur % 60);
    let _ = writeln!(out, "; Banks: {}", n_banks);
    out.push('\n');

    let _ = writeln!(out, "COMPRESS_MODE   = {}", p.compression.mode_int());
    let _ = writeln!(out, "LZ_1CPS         = {}", u8::from(p.lz_1cps));
    let _ = writeln!(out, "N_BANKS         = {}", n_banks);
    let _ = writeln!(out, "VEC_SIZE        = {}", p.vec_size);
    let _ = writeln!(out, "POKEY_CHANNELS  = {}", p.table.channels());
    let _ = writeln!(out, "POKEY_DIVISOR   = ${:02X}", p.divisor);
    let _ = writeln!(out, "AUDCTL_VAL      = ${:02X}", p.audctl);
    let _ = writeln!(out, "IRQ_MASK        = $01");
    let _ = writeln!(out, "SILENCE         = $10");
    let _ = writeln!(out, "PORTB_MAIN      = $FE");
    let _ = writeln!(out, "CODE_BASE       = $2000");
    let _ = writeln!(out, "BANK_BASE       = ${:04X}", BANK_BASE);
    let _ = writeln!(out, "LZ_BUF_BASE     = $8000");
    let _ = writeln!(out, "LZ_BUF_END      = $C000");
    let _ = writeln!(out, "STUB_ADDR       = $0600");
    out
}

/// Four 256-entry AUDC tables; channels past the configured count stay
/// silent so the player source never needs to special-case them. In
/// 1cps mode two extra tables decode the packed `(ch << 4) | vol`
/// bytes: an AUDC register offset and the volume byte itself.
fn audc_tables_asm(table: &LevelTable, lz_1cps: bool) -> String {
    let mut out = String::new();
    banner(&mut out, "audc_tables.asm", "level index to AUDC lookup");
    let _ = writeln!(
        out,
        "; {} channel(s), {} levels; entry = volume | $10, padded with silence",
        table.channels(),
        table.len()
    );
    out.push('\n');

    for ch in 0..4 {
        let _ = writeln!(out, "audc{}_tab:", ch + 1);
        let tab = table.audc_table(ch);
        for row in tab.chunks(16) {
            push_byte_row(&mut out, row);
        }
        out.push('\n');
    }

    if lz_1cps {
        let _ = writeln!(out, "; packed byte -> AUDC register offset (0/2/4/6)");
        let _ = writeln!(out, "ch_offset_tab:");
        let offsets: Vec<u8> = (0..=255u8).map(|b| ((b >> 4) & 0x03) * 2).collect();
        for row in offsets.chunks(16) {
            push_byte_row(&mut out, row);
        }
        out.push('\n');
        let _ = writeln!(out, "; packed byte -> volume | $10");
        let _ = writeln!(out, "audc_val_tab:");
        let vals: Vec<u8> = (0..=255u8).map(|b| (b & 0x0F) | 0x10).collect();
        for row in vals.chunks(16) {
            push_byte_row(&mut out, row);
        }
        out.push('\n');
    }
    out
}

fn portb_table_asm() -> String {
    let mut out = String::new();
    banner(&mut out, "portb_table.asm", "bank PORTB values");
    let _ = writeln!(
        out,
        "; Placeholder: play_init copies the detected codes from TAB_MEM_BANKS."
    );
    out.push('\n');
    let _ = writeln!(out, "portb_table:");
    for _ in 0..4 {
        push_byte_row(&mut out, &[0xFEu8; 16]);
    }
    out
}

/// Codebook entry address tables: entry N lives at BANK_BASE + N * vec_size
fn vq_tables_asm(vec_size: usize) -> String {
    let addr = |i: usize| BANK_BASE as usize + i * vec_size;

    let mut out = String::new();
    banner(&mut out, "vq_tables.asm", "VQ codebook address lookup");
    let _ = writeln!(
        out,
        "; vec_size={}: entry N -> ${:04X} + N*{}",
        vec_size, BANK_BASE, vec_size
    );
    out.push('\n');

    let _ = writeln!(out, "vq_lo_tab:");
    for base in (0..256).step_by(16) {
        let row: Vec<u8> = (base..base + 16).map(|i| (addr(i) & 0xFF) as u8).collect();
        push_byte_row(&mut out, &row);
    }
    out.push('\n');
    let _ = writeln!(out, "vq_hi_tab:");
    for base in (0..256).step_by(16) {
        let row: Vec<u8> = (base..base + 16).map(|i| (addr(i) >> 8) as u8).collect();
        push_byte_row(&mut out, &row);
    }
    out
}

fn splash_data_asm(p: &ProjectParams<'_>) -> String {
    let n_banks = p.banks.len();
    let ram_kb = n_banks * 16 + 64;
    let mode_label = match p.compression {
        Compression::Vq => format!("VQ{}", p.vec_size),
        Compression::Lz => "DELTALZ".to_string(),
        Compression::Off => "RAW".to_string(),
    };

    let line1 = center("STREAM PLAYER  -  PRESS A KEY TO PLAY");
    let line2 = format_info_line(p.table.channels(), p.actual_rate, &mode_label, ram_kb);
    let err_title = center("STREAM PLAYER");
    let err_msg = center(&format!("ERROR: {}KB MEMORY REQUIRED", ram_kb));

    let mut out = String::new();
    banner(&mut out, "splash_data.asm", "splash screen text");
    let _ = writeln!(out, "; 40 bytes per line, ANTIC Mode 2 screen codes.");
    out.push('\n');

    for (label, text) in [
        ("text_line1", line1),
        ("text_line2", line2),
        ("text_err_title", err_title),
        ("text_err_msg", err_msg),
    ] {
        let _ = writeln!(out, "{}:", label);
        for row in to_screen_codes(&text).chunks(8) {
            push_byte_row(&mut out, row);
        }
        out.push('\n');
    }
    out
}

fn bank_asm(index: usize, data: &[u8]) -> String {
    let mut out = String::new();
    banner(
        &mut out,
        &format!("bank_{:02}.asm", index),
        &format!("bank {} data, {} bytes", index, data.len()),
    );
    out.push('\n');
    let _ = writeln!(out, "    org BANK_BASE");
    out.push('\n');
    for row in data.chunks(16) {
        push_byte_row(&mut out, row);
    }
    out
}

/// Per-bank INIT stubs: switch PORTB to the freshly detected bank, load
/// the data at the bank window, switch back to main RAM
fn banks_asm(n_banks: usize) -> String {
    let mut out = String::new();
    banner(&mut out, "banks.asm", "bank loading INIT stubs");
    let _ = writeln!(
        out,
        "; TAB_MEM_BANKS holds the PORTB codes found by mem_detect at load time."
    );
    out.push('\n');

    for i in 0..n_banks {
        let _ = writeln!(out, "; --- Bank {} ---", i);
        let _ = writeln!(out, "    org STUB_ADDR");
        let _ = writeln!(out, "    lda TAB_MEM_BANKS+{}", i + 1);
        let _ = writeln!(out, "    sta PORTB");
        let _ = writeln!(out, "    rts");
        let _ = writeln!(out, "    ini STUB_ADDR");
        out.push('\n');
        let _ = writeln!(out, "    icl 'bank_{:02}.asm'", i);
        out.push('\n');
        let _ = writeln!(out, "    org STUB_ADDR");
        let _ = writeln!(out, "    lda #PORTB_MAIN");
        let _ = writeln!(out, "    sta PORTB");
        let _ = writeln!(out, "    rts");
        let _ = writeln!(out, "    ini STUB_ADDR");
        out.push('\n');
    }
    out
}

fn push_byte_row(out: &mut String, row: &[u8]) {
    let vals: Vec<String> = row.iter().map(|b| format!("${:02X}", b)).collect();
    let _ = writeln!(out, "    .byte {}", vals.join(","));
}

/// True when a bank payload would overflow the 16 KB window; the packers
/// uphold this themselves, the generator double-checks before emitting
pub fn bank_fits(bank: &[u8]) -> bool {
    bank.len() <= BANK_SIZE
}
