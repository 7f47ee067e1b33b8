//! 메시지 필터 -- 화이트리스트 방식 패턴 규칙
//!
//! 규칙이 하나도 없으면 모든 메시지를 통과시킵니다.
//! 규칙이 있으면 하나 이상의 규칙에 매칭되는 메시지만 통과합니다.
//!
//! 패턴 형식:
//! - `/expr/`: 정규식 (부분 매칭)
//! - 그 외: 정확히 일치하는 문자열

use regex::Regex;

/// 필터 규칙 하나
#[derive(Debug, Clone)]
pub enum FilterRule {
    /// 정확히 일치
    Exact(String),
    /// 정규식 (미리 컴파일됨)
    Regex(Regex),
}

impl FilterRule {
    /// 패턴 문자열을 규칙으로 변환합니다.
    ///
    /// 슬래시로 감싼 패턴은 정규식으로 컴파일합니다.
    pub fn parse(pattern: &str) -> Result<Self, regex::Error> {
        match pattern
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(expr) if !expr.is_empty() => Ok(Self::Regex(Regex::new(expr)?)),
            _ => Ok(Self::Exact(pattern.to_owned())),
        }
    }

    /// 후보 문자열이 이 규칙에 매칭되는지 확인합니다.
    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(s) => s == candidate,
            Self::Regex(re) => re.is_match(candidate),
        }
    }
}

/// 필터 평가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// 전달 대상
    Included,
    /// 제외 (조용히 건너뜀)
    Excluded,
}

/// 순서가 있는 필터 규칙 집합
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    rules: Vec<FilterRule>,
}

impl MessageFilter {
    /// 빈 필터를 생성합니다 (모든 메시지 통과).
    pub fn new() -> Self {
        Self::default()
    }

    /// 패턴 목록으로 필터를 생성합니다.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let mut filter = Self::new();
        for pattern in patterns {
            filter.add(pattern.as_ref())?;
        }
        Ok(filter)
    }

    /// 규칙을 추가합니다.
    pub fn add(&mut self, pattern: &str) -> Result<(), regex::Error> {
        self.rules.push(FilterRule::parse(pattern)?);
        Ok(())
    }

    /// 규칙이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 규칙 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 후보 문자열을 평가합니다.
    pub fn evaluate(&self, candidate: &str) -> FilterDecision {
        if self.rules.is_empty() || self.rules.iter().any(|rule| rule.matches(candidate)) {
            FilterDecision::Included
        } else {
            FilterDecision::Excluded
        }
    }
}
