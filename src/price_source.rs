use crate::error::FetchError;
use crate::model::{Candle, Period, PriceQuery, normalize_ticker};
use crate::resolver::{Resolvable, Resolver};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// 가격 소스 인터페이스
///
/// 네트워크 조회, 파싱, 재시도는 구현체의 책임입니다. 분석 코어는 이미 받아온
/// 시간순 캔들 시퀀스만 사용하며, 구현체의 오류는 해석하지 않고 그대로 전달합니다.
#[async_trait]
pub trait PriceSource: Resolvable<PriceQuery> + Send + Sync + Debug {
    /// 조회 조건에 해당하는 시간순 캔들 시퀀스 반환
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<Candle>, FetchError>;
}

/// 여러 가격 소스 중 조회 조건에 맞는 소스를 골라 위임하는 소스
///
/// 자기 자신도 `PriceSource`이므로 분석 템플릿에 그대로 주입할 수 있습니다.
#[derive(Debug, Clone)]
pub struct PriceSourceResolver {
    resolver: Resolver<Arc<dyn PriceSource>>,
}

impl PriceSourceResolver {
    /// 등록 순서대로 우선순위를 갖는 리졸버 생성
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        log::debug!("가격 소스 리졸버 생성: 후보 수={}", sources.len());
        PriceSourceResolver {
            resolver: Resolver::new(sources),
        }
    }
}

impl Resolvable<PriceQuery> for PriceSourceResolver {
    fn is_relevant(&self, args: &PriceQuery) -> bool {
        self.resolver
            .candidates()
            .iter()
            .any(|source| source.is_relevant(args))
    }

    fn name(&self) -> String {
        let names: Vec<String> = self
            .resolver
            .candidates()
            .iter()
            .map(|s| s.name())
            .collect();
        format!("resolver[{}]", names.join(", "))
    }
}

#[async_trait]
impl PriceSource for PriceSourceResolver {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<Candle>, FetchError> {
        let source = self.resolver.resolve(query)?;
        log::debug!("가격 소스 선택: {} ({})", source.name(), query.ticker);
        source.fetch(query).await
    }
}

/// 메모리에 고정된 캔들 시리즈를 제공하는 가격 소스
///
/// 테스트, 리플레이, 파일에서 읽어온 데이터를 분석할 때 사용합니다.
/// 지원 주기를 지정하지 않으면 모든 주기에 적합합니다.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceSource {
    name: String,
    periods: Vec<Period>,
    series: HashMap<String, Vec<Candle>>,
}

impl StaticPriceSource {
    pub fn new(name: &str) -> Self {
        StaticPriceSource {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// 지원 주기 제한
    pub fn with_periods(mut self, periods: &[Period]) -> Self {
        self.periods = periods.to_vec();
        self
    }

    /// 티커의 캔들 시리즈 등록 (티커 표기는 조회 조건과 같은 방식으로 정규화)
    pub fn with_series(mut self, ticker: &str, candles: Vec<Candle>) -> Self {
        self.series.insert(normalize_ticker(ticker), candles);
        self
    }

    fn supports(&self, period: Period) -> bool {
        self.periods.is_empty() || self.periods.contains(&period)
    }
}

impl Resolvable<PriceQuery> for StaticPriceSource {
    fn is_relevant(&self, args: &PriceQuery) -> bool {
        self.supports(args.period) && self.series.contains_key(&args.ticker)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch(&self, query: &PriceQuery) -> Result<Vec<Candle>, FetchError> {
        if !self.supports(query.period) {
            let message = format!("{}: 지원하지 않는 주기 {}", self.name, query.period);
            return Err(message.into());
        }

        let series = self
            .series
            .get(&query.ticker)
            .ok_or_else(|| format!("{}: 등록되지 않은 티커 {}", self.name, query.ticker))?;

        let candles: Vec<Candle> = series
            .iter()
            .filter(|c| c.time >= query.start && c.time <= query.end)
            .copied()
            .collect();

        log::debug!(
            "정적 가격 조회: {} {} -> {}개",
            self.name,
            query.ticker,
            candles.len()
        );
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn daily_candles(count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let time = DateTime::<Utc>::UNIX_EPOCH + Duration::days(i);
                let price = 100.0 + i as f64;
                Candle::new(time, price, price + 1.0, price - 1.0, price, 1000.0)
            })
            .collect()
    }

    fn query(ticker: &str, period: Period, days: i64) -> PriceQuery {
        PriceQuery::new(
            ticker,
            DateTime::<Utc>::UNIX_EPOCH,
            DateTime::<Utc>::UNIX_EPOCH + Duration::days(days),
            period,
        )
    }

    #[tokio::test]
    async fn test_static_source_filters_by_range() {
        let source = StaticPriceSource::new("static").with_series("AAPL", daily_candles(10));

        let candles = source
            .fetch(&query("AAPL", Period::Daily, 4))
            .await
            .unwrap();
        assert_eq!(candles.len(), 5);
        assert_eq!(candles[4].close, 104.0);
    }

    #[tokio::test]
    async fn test_static_source_unknown_ticker() {
        let source = StaticPriceSource::new("static").with_series("AAPL", daily_candles(3));
        assert!(!source.is_relevant(&query("MSFT", Period::Daily, 3)));

        let result = source.fetch(&query("MSFT", Period::Daily, 3)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_static_source_dotted_ticker() {
        let source = StaticPriceSource::new("static").with_series("BRK.B", daily_candles(3));

        let dotted = query("BRK.B", Period::Daily, 3);
        let dashed = query("BRK-B", Period::Daily, 3);
        assert!(source.is_relevant(&dotted));
        assert!(source.is_relevant(&dashed));
        assert_eq!(source.fetch(&dotted).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_resolver_picks_source_by_period() {
        let intraday: Arc<dyn PriceSource> = Arc::new(
            StaticPriceSource::new("intraday")
                .with_periods(&[Period::OneMinute, Period::FiveMinutes])
                .with_series("AAPL", daily_candles(2)),
        );
        let daily: Arc<dyn PriceSource> = Arc::new(
            StaticPriceSource::new("daily")
                .with_periods(&[Period::Daily, Period::Weekly])
                .with_series("AAPL", daily_candles(6)),
        );
        let resolver = PriceSourceResolver::new(vec![intraday, daily]);

        let candles = resolver
            .fetch(&query("AAPL", Period::Daily, 10))
            .await
            .unwrap();
        assert_eq!(candles.len(), 6);

        let candles = resolver
            .fetch(&query("AAPL", Period::OneMinute, 10))
            .await
            .unwrap();
        assert_eq!(candles.len(), 2);
    }

    #[tokio::test]
    async fn test_resolver_without_relevant_source() {
        let daily: Arc<dyn PriceSource> = Arc::new(
            StaticPriceSource::new("daily")
                .with_periods(&[Period::Daily])
                .with_series("AAPL", daily_candles(6)),
        );
        let resolver = PriceSourceResolver::new(vec![daily]);
        let monthly = query("AAPL", Period::Monthly, 10);

        assert!(!resolver.is_relevant(&monthly));
        let err = resolver.fetch(&monthly).await.unwrap_err();
        assert!(err.to_string().contains("daily"));
    }
}
