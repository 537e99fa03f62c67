//! Static player fixture
//!
//! The 6502 player source ships with the crate as embedded text. Its
//! contract with the encoder is the set of generated file names it
//! `icl`-includes and the constants they define; everything else about
//! the player is opaque to the pipeline.

/// File names and contents of the static player source
pub(crate) fn player_sources() -> &'static [(&'static str, &'static str)] {
    &[
        (
            "stream_player.asm",
            include_str!("../assets/player/stream_player.asm"),
        ),
        ("atari.inc", include_str!("../assets/player/atari.inc")),
        ("zeropage.inc", include_str!("../assets/player/zeropage.inc")),
        ("copy_rom.asm", include_str!("../assets/player/copy_rom.asm")),
        (
            "mem_detect.asm",
            include_str!("../assets/player/mem_detect.asm"),
        ),
        (
            "pokey_setup.asm",
            include_str!("../assets/player/pokey_setup.asm"),
        ),
        ("splash.asm", include_str!("../assets/player/splash.asm")),
        ("irq_raw.asm", include_str!("../assets/player/irq_raw.asm")),
        ("irq_lz.asm", include_str!("../assets/player/irq_lz.asm")),
        ("irq_vq.asm", include_str!("../assets/player/irq_vq.asm")),
    ]
}
