use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// OHLCV 캔들
///
/// 한 구간의 시가/고가/저가/종가와 거래량을 담는 불변 값입니다.
/// 시퀀스 안에서는 시간 오름차순으로 정렬되어 있다고 가정합니다 (검증하지 않음).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// 새 캔들 생성
    pub fn new(
        time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Candle {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Display for Candle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Candle(t={}, o={}, h={}, l={}, c={}, v={})",
            self.time, self.open, self.high, self.low, self.close, self.volume
        )
    }
}

/// 추세/돌파 신호
///
/// 리포트 출력 시 정수 서수(0, 1, 2)로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrendSignal {
    /// 변화 없음
    #[default]
    NoChange,
    /// 상승 (저항 돌파)
    Bullish,
    /// 하락 (지지 이탈)
    Bearish,
}

impl TrendSignal {
    /// 리포트용 정수 서수
    pub fn ordinal(&self) -> u8 {
        match self {
            TrendSignal::NoChange => 0,
            TrendSignal::Bullish => 1,
            TrendSignal::Bearish => 2,
        }
    }
}

/// 피벗 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Pivot {
    /// 피벗 아님
    #[default]
    Unchanged,
    /// 이웃 구간 내 최고 고가
    High,
    /// 이웃 구간 내 최저 저가
    Low,
}

impl Pivot {
    /// 리포트용 정수 서수
    pub fn ordinal(&self) -> u8 {
        match self {
            Pivot::Unchanged => 0,
            Pivot::High => 1,
            Pivot::Low => 2,
        }
    }
}

/// 분석 결과가 붙은 캔들
///
/// 각 분석은 자신이 계산한 필드만 채우고 나머지는 기본값으로 둡니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedCandle {
    pub candle: Candle,
    pub ema: f64,
    pub trend_signal: TrendSignal,
    pub breakout_signal: TrendSignal,
    pub pivot: Pivot,
}

impl AnnotatedCandle {
    /// 모든 분석 필드가 기본값인 캔들 생성
    pub fn new(candle: Candle) -> Self {
        AnnotatedCandle {
            candle,
            ema: 0.0,
            trend_signal: TrendSignal::NoChange,
            breakout_signal: TrendSignal::NoChange,
            pivot: Pivot::Unchanged,
        }
    }

    pub fn with_ema(mut self, ema: f64) -> Self {
        self.ema = ema;
        self
    }

    pub fn with_pivot(mut self, pivot: Pivot) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_breakout(mut self, breakout: TrendSignal) -> Self {
        self.breakout_signal = breakout;
        self
    }

    /// 종가
    pub fn close(&self) -> f64 {
        self.candle.close
    }

    /// 고정 컬럼 순서의 리포트 레코드로 변환
    pub fn to_record(&self) -> CandleRecord {
        CandleRecord(
            self.candle.time,
            self.candle.open,
            self.candle.high,
            self.candle.low,
            self.candle.close,
            self.candle.volume,
            self.ema,
            self.trend_signal.ordinal(),
            self.breakout_signal.ordinal(),
            self.pivot.ordinal(),
        )
    }
}

impl From<Candle> for AnnotatedCandle {
    fn from(candle: Candle) -> Self {
        AnnotatedCandle::new(candle)
    }
}

/// 리포트 레코드
///
/// 컬럼 순서: time, open, high, low, close, volume, ema, trend, breakout, pivot.
/// 기존 소비자와의 호환을 위해 순서를 바꾸면 안 됩니다. JSON 배열로 직렬화됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandleRecord(
    pub DateTime<Utc>,
    pub f64,
    pub f64,
    pub f64,
    pub f64,
    pub f64,
    pub f64,
    pub u8,
    pub u8,
    pub u8,
);

/// 키 레벨 분석 결과
///
/// 피벗이 분류된 캔들 시퀀스와 중복 제거/병합된 가격 레벨 목록.
/// 레벨은 정렬되지 않으며 병합이 끝난 순서를 유지합니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct KeyLevelResult {
    pub candles: Vec<AnnotatedCandle>,
    pub levels: Vec<f64>,
}

impl KeyLevelResult {
    pub fn new(candles: Vec<AnnotatedCandle>, levels: Vec<f64>) -> Self {
        KeyLevelResult { candles, levels }
    }

    /// 마지막 캔들 종가에 가장 가까운 키 레벨 검색
    ///
    /// 1%에서 시작해 한 단계씩 허용 범위를 넓히며, 범위 안에 `count`개 이상의
    /// 레벨이 들어오면 큰 값부터 `count`개와 그때의 퍼센트를 반환합니다.
    ///
    /// # Arguments
    /// * `max_percentage` - 최대 확장 단계 수
    /// * `count` - 반환할 레벨 개수
    ///
    /// # Returns
    /// * `(Vec<f64>, u32)` - 가까운 레벨 목록(내림차순)과 사용된 퍼센트.
    ///   찾지 못하면 빈 목록과 마지막 퍼센트
    pub fn closest_to_last(&self, max_percentage: u32, count: usize) -> (Vec<f64>, u32) {
        let mut percentage: u32 = 1;
        let Some(last) = self.candles.last() else {
            return (Vec::new(), percentage);
        };
        let close = last.close();

        let steps = self.levels.len().min(max_percentage as usize);
        for _ in 0..steps {
            let band = percentage as f64 / 100.0;
            let mut closest: Vec<f64> = self
                .levels
                .iter()
                .copied()
                .filter(|level| level + level * band >= close && level - level * band <= close)
                .collect();

            if closest.len() >= count {
                closest.sort_by(|a, b| b.total_cmp(a));
                closest.truncate(count);
                log::trace!("가까운 키 레벨 발견: {closest:?} ({percentage}%)");
                return (closest, percentage);
            }

            percentage += 1;
        }

        (Vec::new(), percentage)
    }
}

/// 가격 조회 주기
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    OneHour,
    Daily,
    Weekly,
    Monthly,
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Period::OneMinute => write!(f, "1m"),
            Period::ThreeMinutes => write!(f, "3m"),
            Period::FiveMinutes => write!(f, "5m"),
            Period::OneHour => write!(f, "1h"),
            Period::Daily => write!(f, "1d"),
            Period::Weekly => write!(f, "1w"),
            Period::Monthly => write!(f, "1M"),
        }
    }
}

/// 분석 알고리즘 종류
///
/// 각 분석은 고정된 종류를 선언하며, 리졸버는 요청의 종류와 일치하는 분석을 선택합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// 지수이동평균
    Ema,
    /// 키 레벨(피벗) 검출
    KeyLevels,
    /// 돌파/이탈 검출
    BreakoutDetection,
}

impl Display for AlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlgorithmKind::Ema => write!(f, "ema"),
            AlgorithmKind::KeyLevels => write!(f, "key_levels"),
            AlgorithmKind::BreakoutDetection => write!(f, "breakout_detection"),
        }
    }
}

impl std::str::FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ema" => Ok(AlgorithmKind::Ema),
            "key_levels" => Ok(AlgorithmKind::KeyLevels),
            "breakout_detection" | "breakout" => Ok(AlgorithmKind::BreakoutDetection),
            _ => Err(format!("지원되지 않는 알고리즘: {s}")),
        }
    }
}

/// 가격 조회 파라미터
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceQuery {
    pub ticker: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period: Period,
}

/// 티커 표기 정규화 (`BRK.B` -> `BRK-B`)
pub(crate) fn normalize_ticker(ticker: &str) -> String {
    ticker.replace('.', "-")
}

impl PriceQuery {
    pub fn new(ticker: &str, start: DateTime<Utc>, end: DateTime<Utc>, period: Period) -> Self {
        PriceQuery {
            ticker: normalize_ticker(ticker),
            start,
            end,
            period,
        }
    }
}

/// 분석 요청
///
/// 호출마다 새로 만들어지는 불변 값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period: Period,
    pub algorithm: AlgorithmKind,
}

impl AnalysisRequest {
    pub fn new(
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        period: Period,
        algorithm: AlgorithmKind,
    ) -> Self {
        AnalysisRequest {
            ticker: normalize_ticker(ticker),
            start,
            end,
            period,
            algorithm,
        }
    }

    /// 가격 조회용 파라미터 추출
    pub fn price_query(&self) -> PriceQuery {
        PriceQuery {
            ticker: self.ticker.clone(),
            start: self.start,
            end: self.end,
            period: self.period,
        }
    }
}

impl Display for AnalysisRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AnalysisRequest({} {} {}..{} {})",
            self.algorithm, self.ticker, self.start, self.end, self.period
        )
    }
}
