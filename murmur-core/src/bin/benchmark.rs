fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run() {
        eprintln!("benchmark failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use murmur_core::{
        FeatureConfig, FeatureExtractor, TensorSpec, TensorType, TokenDecoder, Vocabulary,
    };
    use serde::Serialize;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Instant;

    #[derive(Debug)]
    struct Args {
        fixtures_dir: PathBuf,
        iterations: usize,
        vocab: Option<PathBuf>,
        output: Option<PathBuf>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct CaseResult {
        file: String,
        iteration: usize,
        audio_secs: f64,
        extract_ms: f64,
        decode_ms: Option<f64>,
    }

    #[derive(Debug, Clone, Serialize)]
    struct Summary {
        fixtures_dir: String,
        iterations: usize,
        total_runs: usize,
        total_files: usize,
        p50_extract_ms: f64,
        p95_extract_ms: f64,
        avg_extract_ms: f64,
        p50_decode_ms: Option<f64>,
        cases: Vec<CaseResult>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut fixtures_dir: Option<PathBuf> = None;
        let mut iterations: usize = 3;
        let mut vocab: Option<PathBuf> = None;
        let mut output: Option<PathBuf> = None;

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--fixtures" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --fixtures".into());
                    };
                    fixtures_dir = Some(PathBuf::from(v));
                }
                "--iterations" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --iterations".into());
                    };
                    iterations = v
                        .parse::<usize>()
                        .map_err(|_| "invalid value for --iterations".to_string())?
                        .clamp(1, 20);
                }
                "--vocab" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --vocab".into());
                    };
                    vocab = Some(PathBuf::from(v));
                }
                "--output" => {
                    let Some(v) = it.next() else {
                        return Err("missing value for --output".into());
                    };
                    output = Some(PathBuf::from(v));
                }
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p murmur-core --bin benchmark -- \\
  --fixtures <dir> [--iterations <n>] [--vocab <file>] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
        }

        let fixtures_dir = fixtures_dir.unwrap_or_else(|| PathBuf::from("benchmarks/fixtures"));
        Ok(Args {
            fixtures_dir,
            iterations,
            vocab,
            output,
        })
    }

    fn collect_wavs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), String> {
        let entries = std::fs::read_dir(dir).map_err(|e| e.to_string())?;
        for entry in entries {
            let entry = entry.map_err(|e| e.to_string())?;
            let path = entry.path();
            if path.is_dir() {
                collect_wavs(&path, out)?;
                continue;
            }
            let is_wav = path
                .extension()
                .and_then(|s| s.to_str())
                .map(|s| s.eq_ignore_ascii_case("wav"))
                .unwrap_or(false);
            if is_wav {
                out.push(path);
            }
        }
        Ok(())
    }

    /// Read a WAV as mono PCM16LE bytes, folding multi-channel input down.
    fn read_wav_pcm16le(path: &Path) -> Result<(Vec<u8>, u32), String> {
        let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max).map_err(|e| e.to_string()))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let mono: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().copied().sum::<f32>() / channels as f32)
                .collect()
        };

        let mut bytes = Vec::with_capacity(mono.len() * 2);
        for sample in mono {
            let v = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Ok((bytes, spec.sample_rate))
    }

    fn percentile(values: &[f64], p: f64) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    let args = parse_args()?;
    if !args.fixtures_dir.exists() {
        return Err(format!(
            "fixtures directory not found: {}",
            args.fixtures_dir.display()
        ));
    }

    let mut wav_files = Vec::new();
    collect_wavs(&args.fixtures_dir, &mut wav_files)?;
    wav_files.sort();
    if wav_files.is_empty() {
        return Err(format!(
            "no .wav fixtures found in {}",
            args.fixtures_dir.display()
        ));
    }

    let config = FeatureConfig::default();
    let sample_rate = config.sample_rate;
    let input_spec = TensorSpec::new(
        vec![1, config.num_mel_bins as i64, config.num_frames as i64],
        TensorType::Float32,
    );
    let extractor = FeatureExtractor::new(config).map_err(|e| e.to_string())?;

    // With --vocab, each iteration also times decoding a synthetic id
    // sequence cycling through the vocabulary.
    let decoder = match &args.vocab {
        Some(path) => Some(TokenDecoder::new(Arc::new(
            Vocabulary::load(path).map_err(|e| e.to_string())?,
        ))),
        None => None,
    };
    let synthetic_ids: Vec<u8> = (0..200i32)
        .flat_map(|i| i.to_le_bytes())
        .collect();

    println!(
        "Running murmur frontend benchmark on {} fixtures (iterations={})",
        wav_files.len(),
        args.iterations
    );

    let mut cases = Vec::new();
    for wav in &wav_files {
        let (pcm, wav_rate) = read_wav_pcm16le(wav)?;
        if wav_rate != sample_rate {
            println!(
                "skipping {} (sample rate {} != {})",
                wav.display(),
                wav_rate,
                sample_rate
            );
            continue;
        }
        let audio_secs = pcm.len() as f64 / 2.0 / sample_rate as f64;
        let file = wav
            .strip_prefix(&args.fixtures_dir)
            .unwrap_or(wav)
            .display()
            .to_string();

        for iteration in 1..=args.iterations {
            let started = Instant::now();
            let features = extractor
                .extract(&pcm, &input_spec)
                .map_err(|e| format!("{}: {e}", wav.display()))?;
            let extract_ms = started.elapsed().as_secs_f64() * 1000.0;
            assert_eq!(features.len(), input_spec.byte_len());

            let decode_ms = match &decoder {
                Some(decoder) => {
                    let started = Instant::now();
                    decoder
                        .decode(&synthetic_ids, TensorType::Int32)
                        .map_err(|e| e.to_string())?;
                    Some(started.elapsed().as_secs_f64() * 1000.0)
                }
                None => None,
            };

            println!(
                "{file} [{iteration}/{iters}] extract {extract_ms:.1} ms",
                iters = args.iterations
            );
            cases.push(CaseResult {
                file: file.clone(),
                iteration,
                audio_secs,
                extract_ms,
                decode_ms,
            });
        }
    }

    if cases.is_empty() {
        return Err("no fixtures matched the frontend sample rate".into());
    }

    let extract_times: Vec<f64> = cases.iter().map(|c| c.extract_ms).collect();
    let decode_times: Vec<f64> = cases.iter().filter_map(|c| c.decode_ms).collect();
    let summary = Summary {
        fixtures_dir: args.fixtures_dir.display().to_string(),
        iterations: args.iterations,
        total_runs: cases.len(),
        total_files: wav_files.len(),
        p50_extract_ms: percentile(&extract_times, 0.50),
        p95_extract_ms: percentile(&extract_times, 0.95),
        avg_extract_ms: extract_times.iter().sum::<f64>() / extract_times.len() as f64,
        p50_decode_ms: (!decode_times.is_empty()).then(|| percentile(&decode_times, 0.50)),
        cases,
    };

    println!(
        "Done. runs={} extract p50={:.1}ms p95={:.1}ms",
        summary.total_runs, summary.p50_extract_ms, summary.p95_extract_ms
    );

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    if let Some(out) = args.output {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::write(&out, json).map_err(|e| e.to_string())?;
        println!("Wrote benchmark report: {}", out.display());
    } else {
        println!("{json}");
    }

    Ok(())
}
