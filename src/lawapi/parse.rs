//! Normalization of law.go.kr JSON responses.
//!
//! Responses arrive wrapped in a single-key envelope (`{"PrecSearch": {...}}`), counts are
//! sometimes strings, and a one-element result list is sometimes a bare object.

use serde_json::{Map, Value};
use tracing::warn;

use super::LawError;
use super::category::Category;
use super::types::{Article, ArticleRef, Document, DocumentDetail, SearchPage};

const SITE_BASE: &str = "https://www.law.go.kr";
const ERROR_KEYS: [&str; 3] = ["errorMsg", "error", "msg"];
const FALLBACK_LIST_KEYS: [&str; 3] = ["items", "list", "data"];
/// Article, paragraph, subparagraph and item text, outermost first.
const ARTICLE_TEXT_KEYS: [&str; 4] = ["조문내용", "항내용", "호내용", "목내용"];

pub(crate) fn parse_search(
    category: Category,
    body: &Value,
    requested_page: u32,
) -> Result<SearchPage, LawError> {
    let obj = unwrap_envelope(body)
        .as_object()
        .ok_or_else(|| LawError::UnexpectedFormat("search response is not an object".into()))?;

    let list = std::iter::once(category.target())
        .chain(FALLBACK_LIST_KEYS)
        .find_map(|key| obj.get(key));

    let Some(list) = list else {
        if let Some(message) = api_error_message(obj) {
            return Err(LawError::Api { code: 200, message });
        }
        if obj.contains_key("totalCnt") {
            return Ok(SearchPage {
                category,
                total: obj.get("totalCnt").and_then(as_count).unwrap_or(0),
                page: requested_page,
                documents: Vec::new(),
            });
        }
        return Err(LawError::UnexpectedFormat(format!(
            "no '{}' results in response",
            category.target()
        )));
    };

    let documents: Vec<Document> = records(list)
        .map(|record| to_document(category, record))
        .collect();

    let total = obj
        .get("totalCnt")
        .and_then(as_count)
        .unwrap_or(documents.len() as u64);
    let page = obj
        .get("page")
        .and_then(as_count)
        .and_then(|p| u32::try_from(p).ok())
        .unwrap_or(requested_page);

    Ok(SearchPage {
        category,
        total,
        page,
        documents,
    })
}

pub(crate) fn parse_detail(
    category: Category,
    id: &str,
    body: Value,
) -> Result<DocumentDetail, LawError> {
    let inner = unwrap_envelope(&body);
    if let Some(obj) = inner.as_object() {
        if let Some(message) = api_error_message(obj) {
            return Err(LawError::Api { code: 200, message });
        }
        if obj.is_empty() {
            return Err(LawError::NotFound(format!("{} {id}", category.target())));
        }
    } else {
        return Err(LawError::UnexpectedFormat(
            "detail response is not an object".into(),
        ));
    }

    Ok(DocumentDetail {
        category,
        id: id.to_string(),
        body: inner.clone(),
    })
}

pub(crate) fn parse_article(
    mst: &str,
    article: ArticleRef,
    body: &Value,
) -> Result<Article, LawError> {
    let inner = unwrap_envelope(body);
    if let Some(message) = inner.as_object().and_then(api_error_message) {
        return Err(LawError::Api { code: 200, message });
    }
    let mut lines = Vec::new();
    collect_article_text(inner, &mut lines);
    if lines.is_empty() {
        return Err(LawError::NotFound(format!("{article} of statute {mst}")));
    }
    Ok(Article {
        statute_id: mst.to_string(),
        article,
        text: lines.join("\n"),
    })
}

fn collect_article_text(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            lines.extend(
                ARTICLE_TEXT_KEYS
                    .iter()
                    .filter_map(|key| obj.get(*key).and_then(value_text)),
            );
            for (key, child) in obj {
                if !ARTICLE_TEXT_KEYS.contains(&key.as_str()) {
                    collect_article_text(child, lines);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_article_text(item, lines);
            }
        }
        _ => {}
    }
}

fn unwrap_envelope(value: &Value) -> &Value {
    match value.as_object() {
        Some(obj) if obj.len() == 1 => match obj.values().next() {
            Some(inner @ Value::Object(_)) => inner,
            _ => value,
        },
        _ => value,
    }
}

fn api_error_message(obj: &Map<String, Value>) -> Option<String> {
    ERROR_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(value_text))
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn records(list: &Value) -> Box<dyn Iterator<Item = &Map<String, Value>> + '_> {
    match list {
        Value::Array(items) => Box::new(items.iter().filter_map(Value::as_object)),
        Value::Object(obj) => Box::new(std::iter::once(obj)),
        other => {
            warn!(kind = ?other, "ignoring non-list search results");
            Box::new(std::iter::empty())
        }
    }
}

fn to_document(category: Category, record: &Map<String, Value>) -> Document {
    let fields = category.fields();
    Document {
        category,
        id: first_text(record, fields.id),
        title: first_text(record, fields.title).unwrap_or_else(|| "(untitled)".to_string()),
        date: first_text(record, fields.date),
        summary: first_text(record, fields.summary),
        link: first_text(record, fields.link).map(absolute_link),
        fields: record.clone(),
    }
}

fn first_text(record: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| record.get(*name).and_then(value_text))
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => strip_markup(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn absolute_link(link: String) -> String {
    if link.starts_with('/') {
        format!("{SITE_BASE}{link}")
    } else {
        link
    }
}

/// Drops HTML tags, turning `<br>` variants into newlines, and decodes common entities.
pub(crate) fn strip_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut tag = String::new();
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' if !in_tag => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|c: char| c.is_whitespace() || c == '/')
                    .next()
                    .unwrap_or("");
                if name.eq_ignore_ascii_case("br") {
                    out.push('\n');
                }
            }
            _ if in_tag => tag.push(c),
            _ => out.push(c),
        }
    }
    if in_tag {
        out.push('<');
        out.push_str(&tag);
    }

    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_enveloped_precedent_list() {
        let body = json!({
            "PrecSearch": {
                "target": "prec",
                "totalCnt": "2",
                "page": "1",
                "prec": [
                    {
                        "판례일련번호": "228541",
                        "사건명": "부당해고구제재심판정취소",
                        "사건번호": "2020두12345",
                        "선고일자": "2021.03.11",
                        "법원명": "대법원",
                        "판례상세링크": "/DRF/lawService.do?target=prec&ID=228541"
                    },
                    {
                        "판례일련번호": 228542,
                        "사건명": "손해배상(기)",
                        "선고일자": "2020.11.26"
                    }
                ]
            }
        });

        let page = parse_search(Category::Precedent, &body, 1).unwrap();

        assert_eq!(page.total, 2);
        assert_eq!(page.documents.len(), 2);
        let first = &page.documents[0];
        assert_eq!(first.category, Category::Precedent);
        assert_eq!(first.id.as_deref(), Some("228541"));
        assert_eq!(first.title, "부당해고구제재심판정취소");
        assert_eq!(first.date.as_deref(), Some("2021.03.11"));
        assert_eq!(
            first.link.as_deref(),
            Some("https://www.law.go.kr/DRF/lawService.do?target=prec&ID=228541")
        );
        assert_eq!(first.fields["법원명"], "대법원");
        assert_eq!(page.documents[1].id.as_deref(), Some("228542"));
    }

    #[test]
    fn accepts_single_object_and_numeric_counts() {
        let body = json!({
            "LawSearch": {
                "totalCnt": 1,
                "page": 3,
                "law": {"법령일련번호": "1234", "법령명한글": "근로기준법", "시행일자": "20240101"}
            }
        });

        let page = parse_search(Category::Statute, &body, 1).unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.page, 3);
        assert_eq!(page.documents[0].title, "근로기준법");
        assert_eq!(page.documents[0].date.as_deref(), Some("20240101"));
    }

    #[test]
    fn zero_results_without_list_is_empty_page() {
        let body = json!({"LawSearch": {"totalCnt": "0", "page": "1"}});
        let page = parse_search(Category::Statute, &body, 1).unwrap();
        assert_eq!(page.total, 0);
        assert!(page.documents.is_empty());
    }

    #[test]
    fn unenveloped_fallback_list_key() {
        let body = json!({"totalCnt": 1, "items": [{"자치법규명": "서울특별시 주차장 설치 조례"}]});
        let page = parse_search(Category::LocalOrdinance, &body, 1).unwrap();
        assert_eq!(page.documents[0].title, "서울특별시 주차장 설치 조례");
    }

    #[test]
    fn error_body_is_api_error() {
        let body = json!({"errorCode": "01", "errorMsg": "인증키가 유효하지 않습니다."});
        match parse_search(Category::Statute, &body, 1) {
            Err(LawError::Api { message, .. }) => assert!(message.contains("인증키")),
            other => panic!("expected Api error, got: {other:?}"),
        }
    }

    #[test]
    fn unknown_shape_is_unexpected_format() {
        let body = json!({"foo": 1, "bar": 2});
        assert!(matches!(
            parse_search(Category::Treaty, &body, 1),
            Err(LawError::UnexpectedFormat(_))
        ));
    }

    #[test]
    fn missing_title_uses_placeholder() {
        let body = json!({"AdmRulSearch": {"totalCnt": "1", "admrul": [{"행정규칙일련번호": "9"}]}});
        let page = parse_search(Category::AdminRule, &body, 1).unwrap();
        assert_eq!(page.documents[0].title, "(untitled)");
    }

    #[test]
    fn detail_unwraps_envelope() {
        let body = json!({"PrecService": {"사건명": "손해배상", "판시사항": "요지"}});
        let detail = parse_detail(Category::Precedent, "42", body).unwrap();
        assert_eq!(detail.id, "42");
        assert_eq!(detail.body["사건명"], "손해배상");
    }

    #[test]
    fn detail_empty_is_not_found() {
        let body = json!({"PrecService": {}});
        assert!(matches!(
            parse_detail(Category::Precedent, "42", body),
            Err(LawError::NotFound(_))
        ));
    }

    #[test]
    fn article_text_follows_paragraph_nesting() {
        let body = json!({
            "법령": {
                "조문": {"조문단위": {
                    "조문내용": "제23조(해고 등의 제한)",
                    "항": [
                        {"항내용": "① 사용자는 정당한 이유 없이 해고하지 못한다."},
                        {
                            "항내용": "② 사용자는 다음 기간에 해고하지 못한다.",
                            "호": {"호내용": "1. 산전·산후의 휴업기간"}
                        }
                    ]
                }}
            }
        });
        let article = ArticleRef::parse("23").unwrap();
        let parsed = parse_article("265959", article, &body).unwrap();
        assert_eq!(
            parsed.text.lines().collect::<Vec<_>>(),
            vec![
                "제23조(해고 등의 제한)",
                "① 사용자는 정당한 이유 없이 해고하지 못한다.",
                "② 사용자는 다음 기간에 해고하지 못한다.",
                "1. 산전·산후의 휴업기간",
            ]
        );
    }

    #[test]
    fn strip_markup_handles_breaks_and_entities() {
        assert_eq!(
            strip_markup("가.<br/>나.<br>다 &lt;주&gt; <strong>강조</strong>"),
            "가.\n나.\n다 <주> 강조"
        );
    }

    #[test]
    fn strip_markup_keeps_unclosed_angle() {
        assert_eq!(strip_markup("a < b"), "a < b");
    }

    #[test]
    fn summary_is_stripped_of_markup() {
        let body = json!({"PrecSearch": {"totalCnt": "1", "prec": [{"사건명": "x", "판시사항": "[1] 가<br/>[2] 나"}]}});
        let page = parse_search(Category::Precedent, &body, 1).unwrap();
        assert_eq!(page.documents[0].summary.as_deref(), Some("[1] 가\n[2] 나"));
    }
}
