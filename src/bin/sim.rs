//! GBN 시뮬레이터 - Go-Back-N ARQ over Gilbert-Elliott channel
//!
//! 텍스트 패킷 또는 파일 청크를 잡음 채널 위로 전송하고 통계를 출력한다.
//!
//! 사용법:
//!   cargo run --release --bin gbn-sim -- [OPTIONS]
//!
//! 예시:
//!   # 기본 30개 패킷, 기본 채널
//!   cargo run --release --bin gbn-sim -- --seed 42
//!
//!   # 폭풍 시나리오 + 파일 복사
//!   cargo run --release --bin gbn-sim -- -s storm --file photo.jpg --output copy.jpg

use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gbn::{
    chunk_payloads, run_duplex, text_payloads, ArqConfig, ChannelModel, ClockMode, Error,
    Simulation, DEFAULT_TARGET_PACKETS,
};

/// 실행 옵션
struct SimArgs {
    config: ArqConfig,
    packets: usize,
    file_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    duplex: bool,
    level: Level,
}

impl Default for SimArgs {
    fn default() -> Self {
        Self {
            config: ArqConfig::default(),
            packets: DEFAULT_TARGET_PACKETS,
            file_path: None,
            output_path: None,
            duplex: false,
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

fn parse_args() -> gbn::Result<SimArgs> {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = SimArgs::default();

    // 시나리오를 먼저 적용해야 개별 옵션이 덮어쓸 수 있다
    if let Some(pos) = args.iter().position(|a| a == "--scenario" || a == "-s") {
        let name = value(&args, pos, "--scenario")?;
        parsed.config = ArqConfig::scenario(name)
            .ok_or_else(|| Error::InvalidArgument(format!("알 수 없는 시나리오: {}", name)))?;
    }

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" | "-s" => {
                i += 1;
            }
            "--packets" | "-n" => {
                parsed.packets = number(&args, i, "--packets")?;
                i += 1;
            }
            "--window" | "-w" => {
                parsed.config.window_size = number(&args, i, "--window")?;
                i += 1;
            }
            "--seq-bits" => {
                parsed.config.seq_bits = number(&args, i, "--seq-bits")?;
                i += 1;
            }
            "--timeout-ms" => {
                parsed.config.timeout = Duration::from_millis(number(&args, i, "--timeout-ms")?);
                i += 1;
            }
            "--tick-ms" => {
                parsed.config.tick = Duration::from_millis(number(&args, i, "--tick-ms")?);
                i += 1;
            }
            "--seed" => {
                parsed.config.seed = Some(number(&args, i, "--seed")?);
                i += 1;
            }
            "--loss" => {
                parsed.config.loss_probability = number(&args, i, "--loss")?;
                i += 1;
            }
            "--bsc" => {
                parsed.config.channel_model = ChannelModel::Bsc(number(&args, i, "--bsc")?);
                i += 1;
            }
            "--ideal" => {
                parsed.config.channel_model = ChannelModel::Ideal;
            }
            "--max-iterations" => {
                parsed.config.max_iterations = Some(number(&args, i, "--max-iterations")?);
                i += 1;
            }
            "--file" | "-f" => {
                parsed.file_path = Some(PathBuf::from(value(&args, i, "--file")?));
                i += 1;
            }
            "--output" | "-o" => {
                parsed.output_path = Some(PathBuf::from(value(&args, i, "--output")?));
                i += 1;
            }
            "--chunk-size" | "-c" => {
                parsed.config.chunk_size = number(&args, i, "--chunk-size")?;
                i += 1;
            }
            "--wall" => {
                parsed.config.clock_mode = ClockMode::Wall;
            }
            "--async" | "-a" => {
                parsed.duplex = true;
            }
            "--verbose" | "-v" => {
                parsed.level = Level::DEBUG;
            }
            "--trace" => {
                parsed.level = Level::TRACE;
            }
            "--help" | "-h" => {
                println!(
                    r#"GBN Sim - Go-Back-N ARQ 시뮬레이터

슬라이딩 윈도우 + 누적 ACK + 단일 타이머 재전송
- CRC-32 프레임, Gilbert-Elliott 버스트 채널 (BSC / 무손실 / 프레임 손실 선택)
- 가상 시계로 결정적 실행, --async로 tokio 송수신 태스크 실행

사용법:
  cargo run --release --bin gbn-sim -- [OPTIONS]

옵션:
  -s, --scenario <NAME>    채널 프리셋: clear | rain | storm
  -n, --packets <N>        텍스트 패킷 수 (기본: 30)
  -w, --window <N>         송신 윈도우 크기 (기본: 4)
  --seq-bits <BITS>        시퀀스 번호 비트 수 (기본: 3)
  --timeout-ms <MS>        재전송 타임아웃 (기본: 400)
  --tick-ms <MS>           반복당 시간 간격 (기본: 10)
  --seed <N>               난수 시드
  --loss <P>               프레임 손실 확률 (기본: 0)
  --bsc <P>                Gilbert-Elliott 대신 BSC 채널 사용
  --ideal                  무손실 채널
  --max-iterations <N>     반복 상한
  -f, --file <PATH>        파일을 청크로 나눠 전송
  -o, --output <PATH>      수신 데이터 저장 경로 (--file과 함께)
  -c, --chunk-size <BYTES> 청크 크기 (기본: 1024)
  --wall                   실제 시계 사용 (tick마다 sleep)
  -a, --async              송신/수신 태스크 동시 실행
  -v, --verbose            프레임 단위 로그
  --trace                  비트 단위 로그
  -h, --help               이 도움말 출력

예시:
  # 가벼운 비, 윈도우 7
  cargo run --release --bin gbn-sim -- -s rain -w 7 --seed 1

  # 파일 복사 + 10% 프레임 손실
  cargo run --release --bin gbn-sim -- -f photo.jpg -o copy.jpg --loss 0.1
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

    parsed.config.validate()?;
    Ok(parsed)
}

fn init_logging(level: Level) -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG가 있으면 필터를 우선한다
    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args()?;
    init_logging(args.level)?;

    let config = args.config.clone();
    info!("GBN Sim starting...");
    info!(
        "Window: {}, MAX_SEQ: {}, Timeout: {:?}, Tick: {:?}",
        config.window_size,
        config.max_seq(),
        config.timeout,
        config.tick
    );
    info!(
        "Channel: {:?}, P={}, R={}, K={}, H={}, Loss={}",
        config.channel_model,
        config.gilbert.p,
        config.gilbert.r,
        config.gilbert.k,
        config.gilbert.h,
        config.loss_probability
    );

    // 전송할 데이터 준비
    let (payloads, is_text) = if let Some(path) = &args.file_path {
        info!("Loading file: {:?}", path);
        let data = std::fs::read(path)?;
        (chunk_payloads(&data, config.chunk_size)?, false)
    } else {
        (text_payloads(args.packets), true)
    };
    info!("Payloads: {}", payloads.len());

    let report = if args.duplex {
        run_duplex(config, payloads).await?
    } else {
        // 실제 시계 모드는 스레드를 재우므로 블로킹 풀에서 실행
        tokio::task::spawn_blocking(move || {
            Simulation::new(config)?.run_observed(payloads, |index, payload: &Bytes| {
                if is_text {
                    info!("[DELIVERED #{}] {}", index + 1, String::from_utf8_lossy(payload));
                }
            })
        })
        .await??
    };

    if let Some(path) = &args.output_path {
        let data: Vec<u8> = report.delivered.concat();
        std::fs::write(path, &data)?;
        info!("Saved {} bytes to {:?}", data.len(), path);
    }

    println!("{}", report.summary());
    Ok(())
}
