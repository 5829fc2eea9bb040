// 가격 범위 분석기 모듈
// 가격 조회 후 구체 분석으로 위임하는 템플릿과 개별 분석 구현을 제공합니다.

pub mod breakout_analyzer;
pub mod ema_analyzer;
pub mod key_level_analyzer;

pub use breakout_analyzer::{BreakoutAnalyzer, BreakoutParams, ZonePrice};
pub use ema_analyzer::{EmaAnalyzer, EmaParams};
pub use key_level_analyzer::{KeyLevelAnalyzer, KeyLevelParams};

use crate::cancel::CancelToken;
use crate::error::{AnalysisError, AnalysisResult};
use crate::model::{AlgorithmKind, AnalysisRequest, AnnotatedCandle, Candle, KeyLevelResult};
use crate::price_source::PriceSource;
use crate::resolver::Resolvable;
use std::fmt::Debug;
use std::sync::Arc;

/// 분석 결과의 형태별 태그 유니온
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutput {
    /// 분석 필드가 채워진 캔들 시퀀스 (EMA, 돌파 검출)
    Candles(Vec<AnnotatedCandle>),
    /// 캔들 시퀀스와 키 레벨 (키 레벨 검출)
    KeyLevels(KeyLevelResult),
}

impl AnalysisOutput {
    /// 진단 메시지용 형태 이름
    pub fn shape_name(&self) -> &'static str {
        match self {
            AnalysisOutput::Candles(_) => "candles",
            AnalysisOutput::KeyLevels(_) => "key_levels",
        }
    }

    /// 형태와 무관하게 캔들 시퀀스 참조 반환
    pub fn candles(&self) -> &[AnnotatedCandle] {
        match self {
            AnalysisOutput::Candles(candles) => candles,
            AnalysisOutput::KeyLevels(result) => &result.candles,
        }
    }

    /// 선언된 형태로 좁히기. 형태가 맞지 않으면 `TypeMismatch`
    pub fn narrow<T: OutputShape>(self) -> AnalysisResult<T> {
        let actual = self.shape_name();
        T::narrow(self).map_err(|_| AnalysisError::TypeMismatch {
            declared: T::NAME,
            actual,
        })
    }
}

/// 호출자가 선언하는 출력 형태
///
/// 런타임 다운캐스트 대신 `AnalysisOutput`을 빠짐없이 매칭해 변환합니다.
pub trait OutputShape: Sized {
    /// 진단 메시지용 형태 이름
    const NAME: &'static str;

    /// 결과를 이 형태로 변환. 불가능하면 원래 결과를 돌려줌
    fn narrow(output: AnalysisOutput) -> Result<Self, AnalysisOutput>;
}

impl OutputShape for Vec<AnnotatedCandle> {
    const NAME: &'static str = "candles";

    fn narrow(output: AnalysisOutput) -> Result<Self, AnalysisOutput> {
        match output {
            AnalysisOutput::Candles(candles) => Ok(candles),
            AnalysisOutput::KeyLevels(result) => Ok(result.candles),
        }
    }
}

impl OutputShape for Vec<Candle> {
    const NAME: &'static str = "plain_candles";

    fn narrow(output: AnalysisOutput) -> Result<Self, AnalysisOutput> {
        let candles = match output {
            AnalysisOutput::Candles(candles) => candles,
            AnalysisOutput::KeyLevels(result) => result.candles,
        };
        Ok(candles.into_iter().map(|c| c.candle).collect())
    }
}

impl OutputShape for KeyLevelResult {
    const NAME: &'static str = "key_levels";

    fn narrow(output: AnalysisOutput) -> Result<Self, AnalysisOutput> {
        match output {
            AnalysisOutput::KeyLevels(result) => Ok(result),
            other @ AnalysisOutput::Candles(_) => Err(other),
        }
    }
}

/// 구체 분석 인터페이스
///
/// 생성 시 고정된 파라미터 외에는 상태를 갖지 않으므로, 같은 인스턴스를
/// 여러 호출에서 동시에 사용해도 안전합니다.
pub trait Analysis: Send + Sync + Debug {
    /// 이 분석이 담당하는 알고리즘 종류
    fn kind(&self) -> AlgorithmKind;

    /// 시간순 캔들 시퀀스 분석
    ///
    /// # Arguments
    /// * `candles` - 분석할 캔들
    /// * `cancel` - 협력적 취소 토큰
    fn analyze(&self, candles: &[Candle], cancel: &CancelToken) -> AnalysisResult<AnalysisOutput>;
}

/// 범위 분석 템플릿
///
/// 요청에 대해 가격 소스에서 캔들을 조회한 뒤(유일한 대기 지점) 구체 분석에 위임합니다.
/// 리졸버에 등록되면 요청의 알고리즘 종류가 분석의 종류와 같을 때 적합합니다.
#[derive(Debug, Clone)]
pub struct RangeAnalyzer {
    source: Arc<dyn PriceSource>,
    analysis: Arc<dyn Analysis>,
}

impl RangeAnalyzer {
    pub fn new(source: Arc<dyn PriceSource>, analysis: Arc<dyn Analysis>) -> Self {
        RangeAnalyzer { source, analysis }
    }

    pub fn kind(&self) -> AlgorithmKind {
        self.analysis.kind()
    }

    /// 가격 조회 후 분석 실행
    ///
    /// # Returns
    /// * `AnalysisResult<AnalysisOutput>` - 분석 결과. 가격 조회 오류는 `Fetch`로 그대로 전달
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> AnalysisResult<AnalysisOutput> {
        log::info!("범위 분석 시작: {request}");
        let candles = self
            .source
            .fetch(&request.price_query())
            .await
            .map_err(AnalysisError::Fetch)?;
        log::debug!("가격 조회 완료: {}개 캔들", candles.len());

        let output = self.analysis.analyze(&candles, cancel)?;
        log::info!(
            "범위 분석 완료: {} ({}, {}개)",
            request.algorithm,
            output.shape_name(),
            output.candles().len()
        );
        Ok(output)
    }

    /// 선언된 형태로 결과를 받는 실행. 형태가 다르면 `TypeMismatch`
    pub async fn run_as<T: OutputShape>(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> AnalysisResult<T> {
        self.run(request, cancel).await?.narrow::<T>()
    }
}

impl Resolvable<AnalysisRequest> for RangeAnalyzer {
    fn is_relevant(&self, args: &AnalysisRequest) -> bool {
        args.algorithm == self.analysis.kind()
    }

    fn name(&self) -> String {
        self.analysis.kind().to_string()
    }
}
