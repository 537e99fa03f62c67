//! End-to-end pipeline: PCM in, XEX (or project sources) out

use tracing::{info, warn};

use pokey_codec::{lz, split_into_banks, vq, CodecError, BANK_SIZE};
use pokey_dsp::{
    apply_preemphasis, dc_block, find_best_divisor, normalize, quantize, quantize_1cps, resample,
    LevelTable, DC_CUTOFF_HZ, HEADROOM_DB, PREEMPHASIS_STRENGTH,
};
use pokey_mads::{assemble, AsmError, SourceSet};

use crate::config::{Compression, EncoderConfig, LzMode};
use crate::project::{self, ProjectParams};
use crate::PipelineError;

/// Generated project: sources ready for the assembler plus the facts the
/// caller usually wants to report
#[derive(Debug)]
pub struct Project {
    pub sources: SourceSet,
    pub main_file: &'static str,
    pub n_banks: usize,
    pub divisor: u8,
    pub audctl: u8,
    pub actual_rate: f64,
    pub samples_encoded: usize,
    pub duration_secs: f64,
}

/// Convert PCM straight to a self-booting XEX binary
pub fn encode_to_xex(
    samples: &[f32],
    src_rate: u32,
    config: &EncoderConfig,
) -> Result<Vec<u8>, PipelineError> {
    let project = generate_project(samples, src_rate, config)?;
    let xex = assemble(&project.sources, project.main_file)?;
    if let Some(limit) = config.xex_size_limit {
        if xex.len() > limit {
            return Err(AsmError::XexTooLarge {
                size: xex.len(),
                limit,
            }
            .into());
        }
    }
    info!(
        bytes = xex.len(),
        banks = project.n_banks,
        rate = project.actual_rate,
        "assembled XEX"
    );
    Ok(xex)
}

/// Run the pipeline up to the generated assembly project
pub fn generate_project(
    samples: &[f32],
    src_rate: u32,
    config: &EncoderConfig,
) -> Result<Project, PipelineError> {
    config.validate()?;
    if samples.is_empty() || src_rate == 0 {
        return Err(PipelineError::AudioTooShort);
    }

    // POKEY timer first: everything downstream runs at the achievable rate
    let timer = find_best_divisor(config.rate);
    info!(
        requested = config.rate,
        actual = timer.actual_rate,
        divisor = timer.divisor,
        audctl = timer.audctl,
        "POKEY timer"
    );

    let target_rate = timer.actual_rate.round() as u32;
    let resampled = if (f64::from(src_rate) - timer.actual_rate).abs() / timer.actual_rate > 0.001
    {
        resample(samples, src_rate, target_rate)
    } else {
        samples.to_vec()
    };

    let mut audio = dc_block(&resampled, DC_CUTOFF_HZ, target_rate as f32);
    audio = normalize(&audio, HEADROOM_DB);
    if config.enhance {
        audio = apply_preemphasis(&audio, PREEMPHASIS_STRENGTH);
        audio = normalize(&audio, HEADROOM_DB);
    }
    for x in &mut audio {
        *x = x.clamp(-1.0, 1.0);
    }

    let table = LevelTable::new(config.channels)?;
    let indices = match (config.compression, config.mode) {
        (Compression::Lz, LzMode::OneCps) => quantize_1cps(&audio, config.noise_shaping),
        _ => quantize(&audio, &table, config.effective_noise_shaping()),
    };

    let (banks, consumed) = encode_banks(&indices, &table, config)?;
    if banks.is_empty() {
        return Err(PipelineError::AudioTooShort);
    }
    debug_assert!(banks.iter().all(|b| project::bank_fits(b)));

    if consumed < indices.len() {
        let dropped = indices.len() - consumed;
        // A sub-vector tail is normal padding loss; running out of banks
        // is real truncation.
        if banks.len() == config.max_banks {
            if config.strict {
                return Err(PipelineError::MaxBanksExceeded {
                    max: config.max_banks,
                    dropped,
                });
            }
            warn!(
                dropped,
                max_banks = config.max_banks,
                "input truncated to fit the bank budget"
            );
        }
    }

    let duration_secs = consumed as f64 / timer.actual_rate;
    let params = ProjectParams {
        banks: &banks,
        compression: config.compression,
        divisor: timer.divisor,
        audctl: timer.audctl,
        actual_rate: timer.actual_rate,
        table: &table,
        vec_size: config.vec_size,
        lz_1cps: config.compression == Compression::Lz && config.mode == LzMode::OneCps,
        duration_secs,
    };
    let sources = project::generate_sources(&params);

    Ok(Project {
        sources,
        main_file: project::MAIN_FILE,
        n_banks: banks.len(),
        divisor: timer.divisor,
        audctl: timer.audctl,
        actual_rate: timer.actual_rate,
        samples_encoded: consumed,
        duration_secs,
    })
}

/// Dispatch to the active codec and verify its output
fn encode_banks(
    indices: &[u8],
    table: &LevelTable,
    config: &EncoderConfig,
) -> Result<(Vec<Vec<u8>>, usize), PipelineError> {
    match config.compression {
        Compression::Vq => {
            let (banks, consumed) = vq::vq_encode_banks(
                indices,
                config.vec_size,
                config.max_banks,
                table.max_level(),
                vq::KMEANS_ITERS,
                config.noise_gate,
            )?;
            if consumed > 0 {
                let decoded = vq::vq_decode_banks(&banks, config.vec_size, consumed)?;
                let rmse = vq::vq_rmse(&indices[..consumed], &decoded);
                let snr = vq::vq_snr(&indices[..consumed], &decoded, table.voltages());
                info!(rmse, snr_db = snr, banks = banks.len(), "VQ verification");
            }
            Ok((banks, consumed))
        }
        Compression::Lz => {
            let use_delta = config.mode == LzMode::Scalar;
            let (banks, consumed) =
                lz::compress_banks(indices, BANK_SIZE, config.max_banks, use_delta)?;
            lz::simulate_decode_buffer(&banks)?;
            // The token stream must decode back to the input exactly; a
            // divergence means the encoder is broken and the XEX would
            // play corrupted audio.
            let mut decoded = Vec::with_capacity(consumed);
            for bank in &banks {
                decoded.extend(lz::decompress_bank(bank, use_delta)?);
            }
            if decoded[..] != indices[..consumed] {
                let at = decoded
                    .iter()
                    .zip(&indices[..consumed])
                    .position(|(a, b)| a != b)
                    .unwrap_or(decoded.len().min(consumed));
                return Err(CodecError::RoundTripMismatch { at }.into());
            }
            let total: usize = banks.iter().map(Vec::len).sum();
            info!(
                banks = banks.len(),
                bytes = total,
                samples = consumed,
                "DeltaLZ packed"
            );
            Ok((banks, consumed))
        }
        Compression::Off => {
            let consumed = indices.len().min(config.max_banks * BANK_SIZE);
            let banks = split_into_banks(&indices[..consumed], config.max_banks)?;
            Ok((banks, consumed))
        }
    }
}
