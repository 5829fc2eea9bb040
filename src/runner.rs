use crate::analyzer::{
    Analysis, AnalysisOutput, BreakoutAnalyzer, EmaAnalyzer, KeyLevelAnalyzer, OutputShape,
    RangeAnalyzer,
};
use crate::cancel::CancelToken;
use crate::config_loader::{AnalysisConfig, ConfigValidation};
use crate::error::AnalysisResult;
use crate::model::AnalysisRequest;
use crate::price_source::PriceSource;
use crate::resolver::{Resolvable, Resolver};
use futures::future::join_all;
use std::sync::Arc;

/// 분석 진입점
///
/// 요청에 맞는 분석을 리졸버로 골라 실행합니다. 등록 목록은 생성 이후 바뀌지 않으므로
/// 여러 티커에 대한 요청을 동시에 실행해도 안전합니다.
#[derive(Debug, Clone)]
pub struct AnalysisRunner {
    resolver: Resolver<RangeAnalyzer>,
}

impl AnalysisRunner {
    /// 등록 순서대로 우선순위를 갖는 실행기 생성
    pub fn new(analyzers: Vec<RangeAnalyzer>) -> Self {
        let names: Vec<String> = analyzers.iter().map(|a| a.name()).collect();
        log::info!("분석 실행기 생성: [{}]", names.join(", "));
        AnalysisRunner {
            resolver: Resolver::new(analyzers),
        }
    }

    /// 설정으로 EMA, 키 레벨, 돌파 분석을 순서대로 등록한 실행기 생성
    ///
    /// 돌파 분석은 등록된 키 레벨 분석 인스턴스를 공유합니다.
    ///
    /// # Arguments
    /// * `config` - 분석 설정
    /// * `source` - 모든 분석이 공유할 가격 소스
    pub fn from_config(
        config: &AnalysisConfig,
        source: Arc<dyn PriceSource>,
    ) -> AnalysisResult<Self> {
        config.validate()?;

        let ema: Arc<dyn Analysis> = Arc::new(EmaAnalyzer::new(config.ema)?);
        let key_levels = Arc::new(KeyLevelAnalyzer::new(config.key_levels)?);
        let breakout: Arc<dyn Analysis> =
            Arc::new(BreakoutAnalyzer::new(config.breakout, key_levels.clone())?);
        let key_levels: Arc<dyn Analysis> = key_levels;

        Ok(Self::new(vec![
            RangeAnalyzer::new(source.clone(), ema),
            RangeAnalyzer::new(source.clone(), key_levels),
            RangeAnalyzer::new(source, breakout),
        ]))
    }

    pub fn analyzers(&self) -> &[RangeAnalyzer] {
        self.resolver.candidates()
    }

    /// 요청을 처리할 분석 선택
    pub fn resolve(&self, request: &AnalysisRequest) -> AnalysisResult<&RangeAnalyzer> {
        self.resolver.resolve(request)
    }

    /// 요청에 맞는 분석 실행 후 결과를 그대로 반환
    pub async fn run(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> AnalysisResult<AnalysisOutput> {
        self.resolve(request)?.run(request, cancel).await
    }

    /// 요청에 맞는 분석을 실행하고 선언된 형태로 반환
    ///
    /// 결과 형태가 선언과 다르면 오류 대신 빈 값을 반환합니다.
    /// 조회/취소/리졸브 오류는 그대로 전달됩니다.
    pub async fn run_as<T>(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> AnalysisResult<T>
    where
        T: OutputShape + Default,
    {
        let output = self.run(request, cancel).await?;
        let actual = output.shape_name();

        match T::narrow(output) {
            Ok(result) => Ok(result),
            Err(_) => {
                log::warn!(
                    "결과 형태 불일치, 빈 결과 반환: 선언={}, 실제={} ({})",
                    T::NAME,
                    actual,
                    request
                );
                Ok(T::default())
            }
        }
    }

    /// 여러 요청을 동시에 실행
    ///
    /// 결과는 요청 순서와 같으며, 한 요청의 실패는 다른 요청에 영향을 주지 않습니다.
    pub async fn run_many(
        &self,
        requests: &[AnalysisRequest],
        cancel: &CancelToken,
    ) -> Vec<AnalysisResult<AnalysisOutput>> {
        log::info!("동시 분석 시작: {}개 요청", requests.len());
        let pending = requests.iter().map(|request| self.run(request, cancel));
        let results = join_all(pending).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        log::info!("동시 분석 완료: 성공={}, 실패={}", results.len() - failed, failed);
        results
    }
}
