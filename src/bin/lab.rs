//! GBN 실험실 - CRC 검출률 측정과 파라미터 스윕
//!
//! 사용법:
//!   cargo run --release --bin gbn-lab -- <detect|sweep> [OPTIONS]
//!
//! 예시:
//!   # BSC 잡음 수준별 CRC 검출률
//!   cargo run --release --bin gbn-lab -- detect --iterations 5000
//!
//!   # 청크 크기 x 채널 25개 조합 스윕
//!   cargo run --release --bin gbn-lab -- sweep --input photo.jpg --csv results.csv

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use gbn::experiment::{
    collision_hunt, detection_trial, sweep, write_csv, DetectionMode, DETECTION_LEVELS,
    SWEEP_CHANNELS, SWEEP_CHUNK_SIZES,
};
use gbn::{ArqConfig, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Detect,
    Sweep,
}

/// 실험 옵션
struct LabArgs {
    command: Command,
    iterations: u64,
    collisions: u64,
    gilbert: bool,
    seed: Option<u64>,
    input_path: Option<PathBuf>,
    size: usize,
    csv_path: Option<PathBuf>,
    level: Level,
}

impl Default for LabArgs {
    fn default() -> Self {
        Self {
            command: Command::Detect,
            iterations: 5_000,
            collisions: 500_000,
            gilbert: false,
            seed: None,
            input_path: None,
            size: 64 * 1024, // 64KB
            csv_path: None,
            level: Level::INFO,
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> gbn::Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("{} 값 필요", flag)))
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> gbn::Result<T> {
    let raw = value(args, i, flag)?;
    raw.parse()
        .map_err(|_| Error::InvalidArgument(format!("{}: 유효한 숫자 필요 ({})", flag, raw)))
}

fn parse_args() -> gbn::Result<LabArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = LabArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "detect" => parsed.command = Command::Detect,
            "sweep" => parsed.command = Command::Sweep,
            "--iterations" | "-n" => {
                parsed.iterations = number(&args, i, "--iterations")?;
                i += 1;
            }
            "--collisions" => {
                parsed.collisions = number(&args, i, "--collisions")?;
                i += 1;
            }
            "--gilbert" | "-g" => {
                parsed.gilbert = true;
            }
            "--seed" => {
                parsed.seed = Some(number(&args, i, "--seed")?);
                i += 1;
            }
            "--input" | "-i" => {
                parsed.input_path = Some(PathBuf::from(value(&args, i, "--input")?));
                i += 1;
            }
            "--size" => {
                parsed.size = number(&args, i, "--size")?;
                i += 1;
            }
            "--csv" => {
                parsed.csv_path = Some(PathBuf::from(value(&args, i, "--csv")?));
                i += 1;
            }
            "--verbose" | "-v" => {
                parsed.level = Level::DEBUG;
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN Lab - CRC-32 검출률 측정과 GBN 파라미터 스윕

사용법:
  cargo run --release --bin gbn-lab -- <detect|sweep> [OPTIONS]

명령:
  detect                 충돌 탐색 + 잡음 수준별 검출률 표
  sweep                  청크 크기 x (H, R) 조합 시뮬레이션, CSV 출력

옵션:
  -n, --iterations <N>   잡음 수준별 프레임 수 (기본: 5000)
  --collisions <N>       충돌 탐색 시도 수 (기본: 500000)
  -g, --gilbert          detect: BSC 대신 Gilbert-Elliott 채널
  --seed <N>             난수 시드
  -i, --input <PATH>     sweep: 전송할 파일
  --size <BYTES>         sweep: 입력 파일이 없을 때 무작위 데이터 크기 (기본: 65536)
  --csv <PATH>           sweep: CSV 저장 경로 (기본: stdout)
  -v, --verbose          상세 로그
  -h, --help             이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            other => {
                return Err(Error::InvalidArgument(format!("알 수 없는 옵션: {}", other)));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

fn run_detect(args: &LabArgs) -> gbn::Result<()> {
    println!("{}\n", collision_hunt(args.collisions, args.seed));

    let mode = if args.gilbert {
        DetectionMode::GilbertElliott
    } else {
        DetectionMode::Bsc
    };

    for (n, &probability) in DETECTION_LEVELS.iter().enumerate() {
        let seed = args.seed.map(|seed| seed.wrapping_add(n as u64 + 1));
        let report = detection_trial(mode, args.iterations, probability, seed)?;
        println!("{}\n", report);
    }

    Ok(())
}

fn run_sweep(args: &LabArgs) -> gbn::Result<()> {
    let data = match &args.input_path {
        Some(path) => {
            info!("Loading file: {:?}", path);
            std::fs::read(path)?
        }
        None => {
            info!("Using random data ({} bytes)", args.size);
            let mut rng = match args.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut data = vec![0u8; args.size];
            rng.fill_bytes(&mut data);
            data
        }
    };

    let base = ArqConfig {
        seed: args.seed,
        ..ArqConfig::default()
    };

    let started = Instant::now();
    let records = sweep(&base, &SWEEP_CHUNK_SIZES, &SWEEP_CHANNELS, &data)?;
    info!(
        "Sweep finished: {} runs in {:.2}s",
        records.len(),
        started.elapsed().as_secs_f64()
    );

    match &args.csv_path {
        Some(path) => {
            write_csv(&records, BufWriter::new(File::create(path)?))?;
            info!("CSV saved: {:?}", path);
        }
        None => write_csv(&records, io::stdout().lock())?,
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Detect => run_detect(&args)?,
        Command::Sweep => run_sweep(&args)?,
    }

    Ok(())
}
