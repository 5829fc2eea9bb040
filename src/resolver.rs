use crate::error::{AnalysisError, AnalysisResult};
use std::fmt::Debug;
use std::sync::Arc;

/// 리졸버에 등록될 수 있는 후보 인터페이스
pub trait Resolvable<Args: ?Sized> {
    /// 요청에 대해 이 후보가 적합한지 여부
    fn is_relevant(&self, args: &Args) -> bool;

    /// 진단 메시지에 사용할 후보 이름
    fn name(&self) -> String;
}

impl<Args: ?Sized, T: Resolvable<Args> + ?Sized> Resolvable<Args> for Arc<T> {
    fn is_relevant(&self, args: &Args) -> bool {
        (**self).is_relevant(args)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

impl<Args: ?Sized, T: Resolvable<Args> + ?Sized> Resolvable<Args> for Box<T> {
    fn is_relevant(&self, args: &Args) -> bool {
        (**self).is_relevant(args)
    }

    fn name(&self) -> String {
        (**self).name()
    }
}

/// 순서가 있는 후보 목록에서 첫 번째로 적합한 후보를 고르는 리졸버
///
/// 등록 순서가 우선순위입니다. 생성 이후에는 읽기 전용이므로
/// 여러 호출자가 동시에 `resolve`를 호출해도 안전합니다.
#[derive(Debug, Clone)]
pub struct Resolver<H> {
    candidates: Vec<H>,
}

impl<H> Resolver<H> {
    pub fn new(candidates: Vec<H>) -> Self {
        Resolver { candidates }
    }

    pub fn candidates(&self) -> &[H] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 요청에 적합한 첫 번째 후보 반환
    ///
    /// # Returns
    /// * `AnalysisResult<&H>` - 선택된 후보, 없으면 모든 후보 이름을 담은 `NoMatchingHandler`
    pub fn resolve<Args>(&self, args: &Args) -> AnalysisResult<&H>
    where
        Args: Debug + ?Sized,
        H: Resolvable<Args>,
    {
        match self.candidates.iter().find(|c| c.is_relevant(args)) {
            Some(candidate) => {
                log::trace!("리졸브 성공: {} <- {:?}", candidate.name(), args);
                Ok(candidate)
            }
            None => {
                let candidates: Vec<String> = self.candidates.iter().map(|c| c.name()).collect();
                log::warn!("적합한 후보 없음: {args:?}, 후보: {candidates:?}");
                Err(AnalysisError::NoMatchingHandler { candidates })
            }
        }
    }
}

/// 이름, 적합성 판정 함수, 핸들러의 묶음
///
/// 별도 트레이트 구현 없이 클로저로 후보를 등록할 때 사용합니다.
pub struct Predicated<Args: ?Sized, H> {
    name: String,
    predicate: Box<dyn Fn(&Args) -> bool + Send + Sync>,
    handler: H,
}

impl<Args: ?Sized, H> Predicated<Args, H> {
    pub fn new(
        name: &str,
        predicate: impl Fn(&Args) -> bool + Send + Sync + 'static,
        handler: H,
    ) -> Self {
        Predicated {
            name: name.to_string(),
            predicate: Box::new(predicate),
            handler,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

impl<Args: ?Sized, H> Resolvable<Args> for Predicated<Args, H> {
    fn is_relevant(&self, args: &Args) -> bool {
        (self.predicate)(args)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl<Args: ?Sized, H: Debug> Debug for Predicated<Args, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicated")
            .field("name", &self.name)
            .field("handler", &self.handler)
            .finish()
    }
}
