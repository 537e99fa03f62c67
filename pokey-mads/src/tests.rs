//! Whole-assembler tests over small programs

use crate::{assemble, assemble_segments, AsmError, SourceSet};

fn sources(main: &str) -> SourceSet {
    let mut s = SourceSet::new();
    s.insert("main.asm", main);
    s
}

fn asm(main: &str) -> Vec<u8> {
    assemble(&sources(main), "main.asm").unwrap()
}

fn asm_err(main: &str) -> AsmError {
    assemble(&sources(main), "main.asm").unwrap_err()
}

#[test]
fn test_multi_segment_golden() {
    // org $2000 / .byte $AA,$BB then org $3000 / .byte $CC
    let xex = asm("    org $2000\n    .byte $AA,$BB\n    org $3000\n    .byte $CC\n");
    assert_eq!(
        xex,
        vec![0xFF, 0xFF, 0x00, 0x20, 0x01, 0x20, 0xAA, 0xBB, 0x00, 0x30, 0x00, 0x30, 0xCC]
    );
}

#[test]
fn test_simple_program_bytes() {
    let xex = asm("    org $0600\nstart:\n    lda #$FE\n    sta $D301\n    rts\n    run start\n");
    // FF FF | 00 06 05 06 | A9 FE 8D 01 D3 60 | run pair
    assert_eq!(
        xex,
        vec![
            0xFF, 0xFF, 0x00, 0x06, 0x05, 0x06, 0xA9, 0xFE, 0x8D, 0x01, 0xD3, 0x60, 0xE0, 0x02,
            0xE1, 0x02, 0x00, 0x06
        ]
    );
}

#[test]
fn test_forward_reference_fixed_absolute() {
    // `target` is only known in pass 2; the load stays absolute even
    // though the value fits a byte.
    let xex = asm("    org $2000\n    lda target\n    rts\ntarget = $10\n");
    assert_eq!(&xex[6..], &[0xAD, 0x10, 0x00, 0x60]);
}

#[test]
fn test_known_zero_page_narrows() {
    let xex = asm("ptr = $80\n    org $2000\n    lda ptr\n    rts\n");
    assert_eq!(&xex[6..], &[0xA5, 0x80, 0x60]);
}

#[test]
fn test_branch_at_limit_assembles() {
    // bne over 127 bytes of padding: offset = target - (pc+2) = 127
    let mut src = String::from("    org $2000\n    bne far\n");
    for _ in 0..127 {
        src.push_str("    .byte 0\n");
    }
    src.push_str("far:\n    rts\n");
    let xex = asm(&src);
    assert_eq!(xex[6], 0xD0);
    assert_eq!(xex[7], 0x7F);
}

#[test]
fn test_branch_past_limit_reports_line() {
    let mut src = String::from("    org $2000\n    bne far\n");
    for _ in 0..128 {
        src.push_str("    .byte 0\n");
    }
    src.push_str("far:\n    rts\n");
    match assemble(&sources(&src), "main.asm").unwrap_err() {
        AsmError::BranchOutOfRange { loc, offset } => {
            assert_eq!(loc.line, 2);
            assert_eq!(loc.file, "main.asm");
            assert_eq!(offset, 128);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_ini_materializes_initad_pair() {
    let src = "    org $0600\nstub:\n    rts\n    ini stub\n    org $2000\n    .byte 1\n";
    let (segments, run) = assemble_segments(&sources(src), "main.asm").unwrap();
    assert_eq!(run, None);
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].start, 0x0600);
    assert_eq!(segments[1].start, 0x02E2);
    assert_eq!(segments[1].data, vec![0x00, 0x06]);
    assert_eq!(segments[2].start, 0x2000);
}

#[test]
fn test_run_points_at_entry() {
    let src = "    org $2000\nstart:\n    rts\n    run start\n";
    let (segments, run) = assemble_segments(&sources(src), "main.asm").unwrap();
    assert_eq!(run, Some(0x2000));
    assert_eq!(segments.len(), 1);
}

#[test]
fn test_undefined_symbol_reports_location() {
    match asm_err("    org $2000\n    lda #<missing\n") {
        AsmError::UndefinedSymbol { loc, name } => {
            assert_eq!(loc.line, 2);
            assert_eq!(name, "missing");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_duplicate_label() {
    match asm_err("a:\n    rts\na:\n") {
        AsmError::DuplicateLabel { loc, name } => {
            assert_eq!(name, "a");
            assert_eq!(loc.line, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_division_by_zero_location() {
    assert!(matches!(
        asm_err("    org $2000\n    .byte 1/0\n"),
        AsmError::DivisionByZero { .. }
    ));
}

#[test]
fn test_dot_error_fires() {
    match asm_err("COND = 1\n.if COND = 1\n    .error \"bad config\"\n.endif\n") {
        AsmError::UserError { message, loc } => {
            assert_eq!(message, "bad config");
            assert_eq!(loc.line, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_dot_error_skipped_when_inactive() {
    let xex = asm("COND = 0\n.if COND = 1\n    .error \"unreachable\"\n.endif\n    org $2000\n    .byte 1\n");
    assert_eq!(xex.len(), 2 + 4 + 1);
}

#[test]
fn test_symbols_in_skipped_branch_stay_undefined() {
    let err = asm_err(
        "M = 0\n.if M = 1\nHIDDEN = 5\n.endif\n    org $2000\n    .byte HIDDEN\n",
    );
    assert!(matches!(err, AsmError::UndefinedSymbol { name, .. } if name == "HIDDEN"));
}

#[test]
fn test_include_across_files() {
    let mut s = SourceSet::new();
    s.insert(
        "main.asm",
        "    icl 'config.asm'\n    org $2000\n    lda #VALUE\n    rts\n",
    );
    s.insert("config.asm", "VALUE = $42\n");
    let xex = assemble(&s, "main.asm").unwrap();
    assert_eq!(&xex[6..], &[0xA9, 0x42, 0x60]);
}

#[test]
fn test_include_error_carries_including_file() {
    let mut s = SourceSet::new();
    s.insert("main.asm", "    icl 'other.asm'\n");
    s.insert("other.asm", "    bogus\n");
    match assemble(&s, "main.asm").unwrap_err() {
        AsmError::UnknownInstruction { loc, name } => {
            assert_eq!(loc.file, "other.asm");
            assert_eq!(loc.line, 1);
            assert_eq!(name, "bogus");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_local_labels_roundtrip() {
    let src = "    org $2000\nfirst:\n@wait:\n    dex\n    bne @wait\n    rts\nsecond:\n@wait:\n    dey\n    bne @wait\n    rts\n";
    let xex = asm(src);
    // first: CA D0 FD 60, second: 88 D0 FD 60
    assert_eq!(&xex[6..], &[0xCA, 0xD0, 0xFD, 0x60, 0x88, 0xD0, 0xFD, 0x60]);
}

#[test]
fn test_word_directive_little_endian() {
    let xex = asm("    org $2000\n    .word $1234, target\ntarget:\n    .byte 9\n");
    assert_eq!(&xex[6..], &[0x34, 0x12, 0x04, 0x20, 0x09]);
}

#[test]
fn test_location_counter_in_equates() {
    // Self-modifying-code idiom used by the player's bank stub:
    // the equate points one past the opcode byte.
    let src = "    org $0600\nstub:\npatch = *+1\n    lda #$FF\n    sta $D301\n    rts\n    org patch\n    .byte $E3\n";
    let (segments, _) = assemble_segments(&sources(src), "main.asm").unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].start, 0x0601);
    assert_eq!(segments[1].data, vec![0xE3]);
}

#[test]
fn test_star_pc_and_star_multiply() {
    let xex = asm("    org $2000\n    .word *\n    .byte 2*3\n");
    assert_eq!(&xex[6..], &[0x00, 0x20, 0x06]);
}

#[test]
fn test_indirect_jmp() {
    let xex = asm("vec = $0222\n    org $2000\n    jmp (vec)\n");
    assert_eq!(&xex[6..], &[0x6C, 0x22, 0x02]);
}

#[test]
fn test_indexed_indirect_modes() {
    let src = "zp = $80\n    org $2000\n    lda (zp),y\n    sta (zp,x)\n";
    let xex = asm(src);
    assert_eq!(&xex[6..], &[0xB1, 0x80, 0x81, 0x80]);
}

#[test]
fn test_accumulator_shift() {
    let xex = asm("    org $2000\n    lsr\n    asl a\n");
    assert_eq!(&xex[6..], &[0x4A, 0x0A]);
}
