//! Routing of free-text questions to direct lookup or AI analysis.

use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Article citation such as `제23조`.
    static ref ARTICLE_CITATION: Regex =
        Regex::new(r"제\s*\d+\s*조").expect("ARTICLE_CITATION regex is valid");
}

const CONTRACT_KEYWORDS: &[&str] = &[
    "계약서", "계약 검토", "독소조항", "불공정", "조항", "계약 위험", "수정", "협상",
];

const OPINION_KEYWORDS: &[&str] = &[
    "자문", "의견서", "법률자문", "법적 검토", "소송", "분쟁", "대응방안", "법적 조치",
];

const SEARCH_KEYWORDS: &[&str] = &[
    "검색", "찾아", "조회", "알려", "법령", "판례", "조문", "법률", "시행령", "시행규칙",
    "고시", "훈령", "예규", "조례", "대법원", "헌재", "헌법재판소", "행정심판", "위원회",
];

const ANALYSIS_KEYWORDS: &[&str] = &[
    "분석", "검토", "해석", "의미", "적용", "해당", "가능", "어떻게", "왜", "설명", "비교",
    "차이", "유리", "불리", "위험", "리스크", "대응", "전략", "조언", "추천",
];

/// Kind of AI deliverable an analysis query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    #[default]
    LegalInfo,
    ContractReview,
    LegalOpinion,
}

impl Service {
    pub fn label(self) -> &'static str {
        match self {
            Service::LegalInfo => "legal information",
            Service::ContractReview => "contract review",
            Service::LegalOpinion => "legal opinion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Answerable by direct document retrieval.
    Lookup,
    /// Needs LLM synthesis over retrieved documents.
    Analysis(Service),
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub kind: QueryKind,
    pub reason: String,
}

pub fn classify(query: &str) -> Classification {
    let q = query.to_lowercase();

    if let Some(kw) = first_match(&q, CONTRACT_KEYWORDS) {
        return Classification {
            kind: QueryKind::Analysis(Service::ContractReview),
            reason: format!("contract keyword '{kw}'"),
        };
    }
    if let Some(kw) = first_match(&q, OPINION_KEYWORDS) {
        return Classification {
            kind: QueryKind::Analysis(Service::LegalOpinion),
            reason: format!("legal-opinion keyword '{kw}'"),
        };
    }

    let search_count = count_matches(&q, SEARCH_KEYWORDS) + usize::from(ARTICLE_CITATION.is_match(&q));
    let analysis_count = count_matches(&q, ANALYSIS_KEYWORDS);

    if search_count > analysis_count && search_count > 0 {
        return Classification {
            kind: QueryKind::Lookup,
            reason: format!("{search_count} lookup keyword(s), {analysis_count} analysis keyword(s)"),
        };
    }

    Classification {
        kind: QueryKind::Analysis(Service::LegalInfo),
        reason: if search_count == 0 && analysis_count == 0 {
            "no routing keywords; defaulting to analysis".to_string()
        } else {
            format!("{analysis_count} analysis keyword(s), {search_count} lookup keyword(s)")
        },
    }
}

fn first_match<'a>(q: &str, keywords: &[&'a str]) -> Option<&'a str> {
    keywords.iter().copied().find(|kw| q.contains(kw))
}

fn count_matches(q: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| q.contains(**kw)).count()
}
