use log::{debug, error, info, warn};
use price_analytics::analyzer::AnalysisOutput;
use price_analytics::config_loader::AnalysisConfig;
use price_analytics::model::{AlgorithmKind, AnalysisRequest, Candle, Period};
use price_analytics::price_source::StaticPriceSource;
use price_analytics::{AnalysisRunner, CancelToken};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

const SUPPORTED: &str = "ema, key_levels, breakout_detection";

fn load_candles(path: &Path) -> Result<Vec<Candle>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("캔들 파일 읽기 실패: {} - {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("캔들 파일 파싱 실패: {} - {}", path.display(), e))
}

fn load_config(path: Option<&String>) -> Result<AnalysisConfig, String> {
    match path {
        Some(path) => {
            debug!("사용자 지정 설정 파일 사용: {}", path);
            AnalysisConfig::from_file(&PathBuf::from(path)).map_err(|e| e.to_string())
        }
        None => {
            debug!("기본 설정 사용");
            Ok(AnalysisConfig::default())
        }
    }
}

async fn run(args: &[String]) -> Result<(), String> {
    let algorithm: AlgorithmKind = args[1].parse()?;
    let candles_path = PathBuf::from(&args[2]);
    let config = load_config(args.get(3))?;

    let candles = load_candles(&candles_path)?;
    let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
        warn!("캔들 파일이 비어 있습니다: {}", candles_path.display());
        return Ok(());
    };
    let (start, end) = (first.time, last.time);

    let ticker = candles_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("LOCAL")
        .to_string();
    info!(
        "분석 대상: {} ({}개 캔들, {} ~ {})",
        ticker,
        candles.len(),
        start,
        end
    );

    let source = StaticPriceSource::new("file").with_series(&ticker, candles);
    let source = Arc::new(source);
    let runner = AnalysisRunner::from_config(&config, source).map_err(|e| e.to_string())?;

    let request = AnalysisRequest::new(&ticker, start, end, Period::Daily, algorithm);
    let output = runner
        .run(&request, &CancelToken::new())
        .await
        .map_err(|e| e.to_string())?;

    for candle in output.candles() {
        let line = serde_json::to_string(&candle.to_record()).map_err(|e| e.to_string())?;
        println!("{}", line);
    }
    if let AnalysisOutput::KeyLevels(result) = &output {
        println!("키 레벨: {:?}", result.levels);
        let (closest, percentage) = result.closest_to_last(100, 1);
        println!("마지막 종가와 가까운 레벨: {:?} ({}%)", closest, percentage);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // 로그 초기화
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    debug!("커맨드 라인 인수: {:?}", args);

    if args.len() < 3 {
        error!("인수가 충분하지 않습니다. 알고리즘과 캔들 파일이 필요합니다.");
        let program = args.first().map(String::as_str).unwrap_or("run_analysis");
        println!(
            "사용법: {} <알고리즘> <캔들_파일.json> [설정_파일_경로]",
            program
        );
        println!("지원되는 알고리즘: {}", SUPPORTED);
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(()) => {
            info!("분석 완료");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("분석 실패: {}", err);
            println!("분석 실패: {}", err);
            if err.contains("지원되지 않는 알고리즘") {
                println!("지원되는 알고리즘: {}", SUPPORTED);
            } else if err.contains("파싱") {
                println!("해결 방법: 파일 형식이 올바른지 확인하세요.");
            } else if err.contains("유효성 검사") || err.contains("잘못된 파라미터") {
                println!("해결 방법: 설정 값이 유효 범위 내에 있는지 확인하세요.");
            }
            ExitCode::FAILURE
        }
    }
}
