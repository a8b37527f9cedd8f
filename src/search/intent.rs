//! Heuristic analysis of a natural-language legal question: intent, keywords, entities,
//! and the document categories worth searching.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::lawapi::{ArticleRef, Category};

const MAX_KEYWORDS: usize = 10;

lazy_static! {
    static ref STATUTE_NAME: Regex = Regex::new(r"(\w+에 관한 (?:특별법|특례법|법률))|(\w+법)")
        .expect("STATUTE_NAME regex is valid");
    static ref ARTICLE: Regex =
        Regex::new(r"제\s*(\d+)\s*조(?:\s*의\s*(\d+))?").expect("ARTICLE regex is valid");
    static ref AMOUNT: Regex = Regex::new(r"(\d+(?:,\d{3})*(?:\.\d+)?)\s*(억원|만원|원)")
        .expect("AMOUNT regex is valid");
    static ref DATE: Regex = Regex::new(r"(\d{4})\s*[년.\-/]\s*(\d{1,2})\s*[월.\-/]\s*(\d{1,2})")
        .expect("DATE regex is valid");
    static ref INTENT_PATTERNS: Vec<(Intent, Regex)> = [
        (Intent::LegalInfo, r"어떻게|방법|절차|조건|요건|기준|무엇|뭐|뭘|어떤|가능|할 수 있|될까|되나요"),
        (Intent::CaseSearch, r"판례|판결|사례|케이스|법원|대법원|헌재|어떻게 판단|어떤 판결"),
        (Intent::Procedure, r"신청|접수|제출|신고|어디서|어디에|언제까지|서류|준비|필요한"),
        (Intent::Definition, r"무엇인가요|뜻|의미|정의|란 무엇|이란|라는|개념|설명"),
        (Intent::Calculation, r"얼마|금액|비용|벌금|기간|기한|며칠|언제|계산|산정|산출"),
        (Intent::Rights, r"권리|의무|책임|받을 수|청구|요구|해야|필수"),
        (Intent::Violation, r"위반|위법|불법|처벌|과태료|형량|고소|고발"),
        (Intent::Contract, r"계약|계약서|약정|조항|유효|무효|취소"),
    ]
    .into_iter()
    .map(|(intent, pattern)| (intent, Regex::new(pattern).expect("intent regex is valid")))
    .collect();
}

const LEGAL_DOMAINS: &[(&str, &[&str])] = &[
    ("labor", &["근로", "해고", "임금", "퇴직", "노동", "근무", "휴가", "연차", "야근", "잔업"]),
    ("real_estate", &["매매", "임대", "전세", "월세", "부동산", "건물", "토지", "아파트", "주택"]),
    ("traffic", &["사고", "음주", "운전", "교통", "자동차", "면허", "벌점", "과속", "신호위반"]),
    ("criminal", &["폭행", "절도", "사기", "명예훼손", "모욕", "협박", "상해", "강도", "살인"]),
    ("family", &["이혼", "양육", "상속", "유언", "혼인", "친권", "양육비", "재산분할"]),
    ("consumer", &["환불", "교환", "하자", "피해", "보상", "계약취소", "소비자"]),
    ("privacy", &["개인정보", "정보유출", "프라이버시", "동의", "열람", "정정", "삭제"]),
    ("tax", &["세금", "소득세", "부가세", "재산세", "종합소득세", "연말정산", "세무"]),
    ("medical", &["의료", "진료", "수술", "의료사고", "보험", "건강보험", "산재"]),
    ("contract", &["계약서", "계약", "위약금", "해지", "해제", "취소", "무효", "조항"]),
];

/// Trailing particles stripped from tokens, checked in order.
const PARTICLES: &[&str] = &[
    "에서", "에게", "한테", "하고", "이나", "거나", "든지", "은", "는", "이", "가", "을", "를",
    "에", "와", "과",
];

const RECENCY_WORDS: &[&str] = &["최근", "요즘", "현재"];

/// Everyday words ending in 법 that never name a statute.
const NON_STATUTE_WORDS: &[&str] = &[
    "방법", "불법", "위법", "합법", "편법", "문법", "적법", "탈법", "해법", "입법",
];

/// Most words a `…에 관한 법률` title carries before `에 관한`.
const MAX_TITLE_WORDS: usize = 6;

/// Final syllables of particles and verb endings; a word ending in one is not part of
/// a statute title.
const WORD_ENDINGS: &[char] = &[
    '고', '서', '면', '는', '은', '을', '를', '요', '다', '게', '만', '줘', '데', '와', '과',
];

/// Keywords that name a category explicitly.
const CATEGORY_HINTS: &[(&[&str], Category)] = &[
    (&["판례", "판결", "법원"], Category::Precedent),
    (&["헌법", "헌재", "위헌"], Category::Constitutional),
    (&["해석", "유권해석"], Category::Interpretation),
    (&["행정심판", "재결"], Category::AdminAppeal),
    (&["조약", "협정"], Category::Treaty),
    (&["행정규칙", "훈령", "예규", "고시"], Category::AdminRule),
    (&["조례", "자치법규"], Category::LocalOrdinance),
    (&["용어", "정의"], Category::LegalTerm),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    LegalInfo,
    CaseSearch,
    Procedure,
    Definition,
    Calculation,
    Rights,
    Violation,
    Contract,
    General,
}

impl Intent {
    fn default_targets(self) -> &'static [Category] {
        match self {
            Intent::CaseSearch => &[
                Category::Precedent,
                Category::Constitutional,
                Category::Interpretation,
            ],
            Intent::Procedure => &[
                Category::Statute,
                Category::AdminRule,
                Category::Interpretation,
            ],
            Intent::Definition => &[Category::LegalTerm, Category::Statute],
            Intent::Violation => &[Category::Statute, Category::Precedent, Category::AdminAppeal],
            Intent::Contract | Intent::Rights => &[
                Category::Statute,
                Category::Precedent,
                Category::Interpretation,
            ],
            _ => &[Category::Statute, Category::Precedent],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Entities {
    pub statutes: Vec<String>,
    pub articles: Vec<ArticleRef>,
    pub amounts: Vec<String>,
    pub dates: Vec<String>,
}

impl Entities {
    fn kinds(&self) -> usize {
        [
            self.statutes.is_empty(),
            self.articles.is_empty(),
            self.amounts.is_empty(),
            self.dates.is_empty(),
        ]
        .iter()
        .filter(|empty| !**empty)
        .count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub intent: Intent,
    pub keywords: Vec<String>,
    pub entities: Entities,
    /// Categories worth searching, in category order.
    pub targets: Vec<Category>,
    pub domain: Option<&'static str>,
    /// The question asks for recent material.
    pub recent: bool,
    pub confidence: f32,
}

impl QueryAnalysis {
    /// Search string for the legal database: a statute name when one is cited, otherwise
    /// the leading keywords, otherwise the question itself.
    pub fn primary_query(&self) -> String {
        if let Some(statute) = self.entities.statutes.first() {
            return statute.clone();
        }
        // dictionary hits are often substrings of a typed token ("상속" in "상속세")
        let distinct: Vec<&str> = self
            .keywords
            .iter()
            .filter(|k| {
                !self
                    .keywords
                    .iter()
                    .any(|other| other != *k && other.contains(k.as_str()))
            })
            .take(2)
            .map(String::as_str)
            .collect();
        if !distinct.is_empty() {
            return distinct.join(" ");
        }
        self.query.trim().to_string()
    }
}

pub fn analyze(query: &str) -> QueryAnalysis {
    let intent = classify_intent(query);
    let keywords = extract_keywords(query);
    let entities = extract_entities(query);
    let targets = determine_targets(intent, &keywords);
    let domain = identify_domain(&keywords);
    let recent = RECENCY_WORDS.iter().any(|w| query.contains(w));
    let confidence = confidence(&keywords, &entities);

    QueryAnalysis {
        query: query.to_string(),
        intent,
        keywords,
        entities,
        targets,
        domain,
        recent,
        confidence,
    }
}

fn classify_intent(query: &str) -> Intent {
    let q = query.to_lowercase();
    INTENT_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(&q))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::General)
}

fn extract_keywords(query: &str) -> Vec<String> {
    let mut keywords: Vec<String> = LEGAL_DOMAINS
        .iter()
        .flat_map(|(_, words)| words.iter())
        .filter(|w| query.contains(**w))
        .map(|w| w.to_string())
        .collect();

    for token in query.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        let word = strip_particles(token);
        if word.chars().count() >= 2 {
            keywords.push(word.to_string());
        }
    }

    let mut seen = BTreeSet::new();
    keywords.retain(|k| seen.insert(k.clone()));
    keywords.truncate(MAX_KEYWORDS);
    keywords
}

fn strip_particles(token: &str) -> &str {
    let mut word = token;
    for particle in PARTICLES {
        if let Some(stem) = word.strip_suffix(particle)
            && !stem.is_empty()
        {
            word = stem;
        }
    }
    word
}

fn extract_entities(query: &str) -> Entities {
    let mut entities = Entities::default();

    for caps in STATUTE_NAME.captures_iter(query) {
        let name = match (caps.get(1), caps.get(2)) {
            (Some(title), _) => full_title(query, title.start(), title.as_str()),
            (None, Some(short)) if !is_everyday_word(short.as_str()) => {
                short.as_str().to_string()
            }
            _ => continue,
        };
        if !entities.statutes.contains(&name) {
            entities.statutes.push(name);
        }
    }
    for caps in ARTICLE.captures_iter(query) {
        let number: Option<u32> = caps[1].parse().ok();
        let branch: Option<u32> = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok());
        if let Some(article) = number.zip(branch).and_then(|(n, b)| ArticleRef::new(n, b))
            && !entities.articles.contains(&article)
        {
            entities.articles.push(article);
        }
    }
    entities.amounts = AMOUNT
        .captures_iter(query)
        .map(|c| format!("{}{}", &c[1], &c[2]))
        .collect();
    entities.dates = DATE
        .captures_iter(query)
        .map(|c| format!("{}-{:0>2}-{:0>2}", &c[1], &c[2], &c[3]))
        .collect();

    entities
}

fn is_everyday_word(name: &str) -> bool {
    NON_STATUTE_WORDS.iter().any(|word| name.ends_with(word))
}

/// Extends a `…에 관한 법률` match leftward over the title words that precede it.
fn full_title(query: &str, start: usize, matched: &str) -> String {
    let prefix = &query[..start];
    if !prefix.ends_with(char::is_whitespace) {
        return matched.to_string();
    }
    let mut words = Vec::new();
    for word in prefix.split_whitespace().rev().take(MAX_TITLE_WORDS) {
        let bare = word.trim_start_matches(|c: char| !c.is_alphanumeric());
        if !is_title_word(bare) {
            break;
        }
        words.push(bare);
        // an opening bracket starts the title
        if bare.len() != word.len() {
            break;
        }
    }
    words.reverse();
    words.push(matched);
    words.join(" ")
}

fn is_title_word(word: &str) -> bool {
    !word.is_empty()
        && word.chars().all(char::is_alphanumeric)
        && !word.ends_with('법')
        && !word.ends_with("법률")
        && !word.ends_with(WORD_ENDINGS)
}

fn determine_targets(intent: Intent, keywords: &[String]) -> Vec<Category> {
    let mut targets: BTreeSet<Category> = intent.default_targets().iter().copied().collect();
    for (hints, category) in CATEGORY_HINTS {
        if keywords
            .iter()
            .any(|kw| hints.iter().any(|hint| kw.contains(hint)))
        {
            targets.insert(*category);
        }
    }
    targets.into_iter().collect()
}

fn identify_domain(keywords: &[String]) -> Option<&'static str> {
    LEGAL_DOMAINS
        .iter()
        .map(|(domain, words)| {
            let score = keywords
                .iter()
                .filter(|kw| words.contains(&kw.as_str()))
                .count();
            (*domain, score)
        })
        .filter(|(_, score)| *score > 0)
        // first domain wins ties
        .fold(None, |best: Option<(&'static str, usize)>, (domain, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((domain, score)),
        })
        .map(|(domain, _)| domain)
}

fn confidence(keywords: &[String], entities: &Entities) -> f32 {
    let mut confidence = 0.5;
    if !keywords.is_empty() {
        confidence += (keywords.len() as f32 * 0.05).min(0.2);
    }
    confidence += entities.kinds() as f32 * 0.1;
    if !entities.statutes.is_empty() {
        confidence += 0.2;
    }
    confidence.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dismissal_question() {
        let a = analyze("회사에서 갑자기 해고 통보를 받았는데 어떻게 대응해야 하나요?");

        assert_eq!(a.intent, Intent::LegalInfo);
        assert_eq!(a.keywords[0], "해고");
        assert!(a.keywords.contains(&"회사".to_string()));
        assert!(a.keywords.contains(&"통보".to_string()));
        assert_eq!(a.domain, Some("labor"));
        assert_eq!(a.targets, vec![Category::Statute, Category::Precedent]);
    }

    #[test]
    fn statute_and_article_entities() {
        let a = analyze("근로기준법 제23조의2 부당해고 요건");

        assert_eq!(a.entities.statutes, vec!["근로기준법".to_string()]);
        assert_eq!(a.entities.articles, vec![ArticleRef::new(23, 2).unwrap()]);
        assert_eq!(a.primary_query(), "근로기준법");
        // 0.5 + 0.2 (keywords capped) + 0.2 (two entity kinds) + 0.2 (statute) capped
        assert!((a.confidence - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn long_statute_title() {
        let a = analyze("주택임대차보호법 말고 상가건물 임대차에 관한 법률 알려줘");
        assert_eq!(
            a.entities.statutes,
            vec!["주택임대차보호법".to_string(), "상가건물 임대차에 관한 법률".to_string()]
        );
    }

    #[test]
    fn multi_word_statute_titles() {
        let a = analyze("성폭력방지 및 피해자보호 등에 관한 법률 제7조");
        assert_eq!(
            a.entities.statutes,
            vec!["성폭력방지 및 피해자보호 등에 관한 법률".to_string()]
        );
        let a = analyze("「개인정보 보호에 관한 특례법」상 처벌");
        assert_eq!(a.entities.statutes, vec!["개인정보 보호에 관한 특례법".to_string()]);
    }

    #[test]
    fn statute_followed_by_particle() {
        let a = analyze("근로기준법에 따른 부당해고 구제 방법");
        assert_eq!(a.entities.statutes, vec!["근로기준법".to_string()]);
        assert_eq!(a.primary_query(), "근로기준법");

        let a = analyze("민법상 손해배상 청구 방법");
        assert_eq!(a.entities.statutes, vec!["민법".to_string()]);
    }

    #[test]
    fn everyday_words_are_not_statutes() {
        let a = analyze("불법 주차 신고 방법과 위법 여부");
        assert!(a.entities.statutes.is_empty(), "got: {:?}", a.entities.statutes);
        assert_ne!(a.primary_query(), "방법");
    }

    #[test]
    fn amounts_and_dates() {
        let a = analyze("2023년 5월 12일 계약금 3,000만원 반환");
        assert_eq!(a.entities.amounts, vec!["3,000만원".to_string()]);
        assert_eq!(a.entities.dates, vec!["2023-05-12".to_string()]);
    }

    #[test]
    fn case_keywords_add_precedent_targets() {
        let a = analyze("음주운전 면허취소 판례");
        assert_eq!(a.intent, Intent::CaseSearch);
        assert!(a.targets.contains(&Category::Precedent));
        assert!(a.targets.contains(&Category::Constitutional));
    }

    #[test]
    fn explicit_category_hints_are_added() {
        let a = analyze("개인정보 보호 고시 조례");
        assert!(a.targets.contains(&Category::AdminRule));
        assert!(a.targets.contains(&Category::LocalOrdinance));
    }

    #[test]
    fn recency_is_detected() {
        assert!(analyze("최근 전세사기 판례").recent);
        assert!(!analyze("전세사기 판례").recent);
    }

    #[test]
    fn general_intent_without_patterns() {
        let a = analyze("상속세");
        assert_eq!(a.intent, Intent::General);
        assert_eq!(a.primary_query(), "상속세");
    }

    #[test]
    fn primary_query_joins_two_keywords() {
        let a = analyze("전세 보증금 반환 소송");
        assert_eq!(a.primary_query(), "전세 보증금");
    }

    #[test]
    fn primary_query_falls_back_to_raw_text() {
        let a = analyze(" ? ");
        assert!(a.keywords.is_empty());
        assert_eq!(a.primary_query(), "?");
    }

    #[test]
    fn particles_are_stripped() {
        assert_eq!(strip_particles("해고를"), "해고");
        assert_eq!(strip_particles("회사에서"), "회사");
        assert_eq!(strip_particles("를"), "를");
    }

    #[test]
    fn keywords_are_capped() {
        let a = analyze("가나 다라 마바 사아 자차 카타 파하 가가 나나 다다 라라 마마");
        assert_eq!(a.keywords.len(), MAX_KEYWORDS);
    }
}
