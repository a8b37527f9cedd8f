pub mod category;
mod parse;
pub mod types;

pub use category::{Category, Court, SortOrder};
pub use types::{
    Article, ArticleRef, DateRange, Document, DocumentDetail, SearchPage, SearchRequest,
};

use std::env;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheConfig, CacheStats, ResponseCache, cache_key};

const API_BASE: &str = "https://www.law.go.kr/DRF";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_DISPLAY: u32 = 100;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Errors returned by the law.go.kr Open API.
#[derive(Debug, thiserror::Error)]
pub enum LawError {
    #[error("LAW_API_KEY not set. Register an OC key at https://open.law.go.kr")]
    ApiKeyNotSet,

    #[error("Legal database rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Legal database API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Unexpected response from legal database: {0}")]
    UnexpectedFormat(String),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Source of legal documents.
/// Implemented by `LawClient` for production; mock implementations used in tests.
pub trait LegalSource {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, LawError>;

    async fn detail(&self, category: Category, id: &str) -> Result<DocumentDetail, LawError>;

    /// One article of the statute with serial number `mst`.
    async fn article(&self, mst: &str, article: ArticleRef) -> Result<Article, LawError>;
}

#[derive(Debug, Clone, Copy)]
pub struct LawCacheStats {
    pub searches: CacheStats,
    pub details: CacheStats,
    pub articles: CacheStats,
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// HTTP client for the law.go.kr "DRF" Open API.
///
/// Search and detail responses are cached by request parameters; the OC key is never
/// part of a cache key.
#[derive(Clone)]
pub struct LawClient {
    http: Client,
    oc: ApiKey,
    base_url: String,
    backoff_ms: u64,
    searches: ResponseCache<SearchPage>,
    details: ResponseCache<DocumentDetail>,
    articles: ResponseCache<Article>,
}

impl LawClient {
    pub fn from_env(http: Client, cache: CacheConfig) -> Result<Self, LawError> {
        let oc = env::var("LAW_API_KEY").map_err(|_| LawError::ApiKeyNotSet)?;
        if oc.trim().is_empty() {
            return Err(LawError::ApiKeyNotSet);
        }
        info!("legal database client configured");
        Ok(Self {
            http,
            oc: ApiKey(oc.trim().to_string()),
            base_url: API_BASE.to_string(),
            backoff_ms: INITIAL_BACKOFF_MS,
            searches: ResponseCache::new(cache),
            details: ResponseCache::new(cache),
            articles: ResponseCache::new(cache),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            oc: ApiKey("test-oc".to_string()),
            base_url: base_url.to_string(),
            backoff_ms: 1,
            searches: ResponseCache::new(CacheConfig::default()),
            details: ResponseCache::new(CacheConfig::default()),
            articles: ResponseCache::new(CacheConfig::default()),
        }
    }

    pub fn cache_stats(&self) -> LawCacheStats {
        LawCacheStats {
            searches: self.searches.stats(),
            details: self.details.stats(),
            articles: self.articles.stats(),
        }
    }

    pub fn clear_cache(&self) {
        self.searches.clear();
        self.details.clear();
        self.articles.clear();
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Value, LawError> {
        let mut url = Url::parse(&format!("{}/{endpoint}", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("OC", &self.oc.0)
            .append_pair("type", "JSON")
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        let response = self
            .http
            .get(url)
            .header("User-Agent", crate::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("legal database rate limited");
            return Err(LawError::RateLimited);
        }
        let text = response.text().await?;
        if !status.is_success() {
            warn!(status = %status, "legal database API error");
            return Err(LawError::Api {
                code: status.as_u16(),
                message: format!("HTTP {status}: {}", snippet(&text)),
            });
        }

        serde_json::from_str(&text).map_err(|_| {
            // The API answers with an HTML page for unknown targets and bad keys.
            LawError::UnexpectedFormat(format!("not JSON: {}", snippet(&text)))
        })
    }

    async fn get_json_with_retry(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, LawError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.get_json(endpoint, params).await {
                Ok(body) => return Ok(body),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(self.backoff_ms, attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying legal database request"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(LawError::RateLimited))
    }
}

impl LegalSource for LawClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchPage, LawError> {
        let category = request.category;
        let mut params = vec![
            ("target", category.target().to_string()),
            ("query", request.query.clone()),
            ("display", request.display.clamp(1, MAX_DISPLAY).to_string()),
            ("page", request.page.max(1).to_string()),
            (
                "search",
                if request.body_search { "2" } else { "1" }.to_string(),
            ),
        ];
        if let Some(sort) = request.sort {
            params.push(("sort", sort.code().to_string()));
        }
        if category == Category::Precedent {
            if let Some(court) = request.court {
                params.push(("org", court.code().to_string()));
            }
            if let Some(decided) = &request.decided {
                params.push(("prncYd", decided.param()));
            }
        }

        let key = cache_key("lawSearch", &params);
        let page = self
            .searches
            .get_or_try_fetch(key, async {
                let body = self.get_json_with_retry("lawSearch.do", &params).await?;
                parse::parse_search(category, &body, request.page.max(1))
            })
            .await?;

        debug!(
            target = category.target(),
            total = page.total,
            returned = page.documents.len(),
            "law search complete"
        );
        Ok(page)
    }

    async fn detail(&self, category: Category, id: &str) -> Result<DocumentDetail, LawError> {
        let params = vec![
            ("target", category.target().to_string()),
            (category.detail_id_param(), id.to_string()),
        ];
        let key = cache_key("lawService", &params);
        self.details
            .get_or_try_fetch(key, async {
                let body = self.get_json_with_retry("lawService.do", &params).await?;
                parse::parse_detail(category, id, body)
            })
            .await
    }

    async fn article(&self, mst: &str, article: ArticleRef) -> Result<Article, LawError> {
        let params = vec![
            ("target", "lawjosub".to_string()),
            ("MST", mst.to_string()),
            ("JO", article.jo_code()),
        ];
        let key = cache_key("lawService", &params);
        let found = self
            .articles
            .get_or_try_fetch(key, async {
                let body = self.get_json_with_retry("lawService.do", &params).await?;
                parse::parse_article(mst, article, &body)
            })
            .await?;
        debug!(mst, article = %article, "statute article fetched");
        Ok(found)
    }
}

fn is_retriable(e: &LawError) -> bool {
    match e {
        LawError::RateLimited => true,
        LawError::Api { code, .. } => (500..=599).contains(code),
        LawError::Network(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial_ms: u64, attempt: u32) -> u64 {
    let base = initial_ms * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn snippet(text: &str) -> &str {
    if text.len() > 200 {
        &text[..text.floor_char_boundary(200)]
    } else {
        text
    }
}


#[cfg(test)]
mod http_tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn precedent_body() -> Value {
        serde_json::json!({
            "PrecSearch": {
                "totalCnt": "1",
                "page": "1",
                "prec": [{
                    "판례일련번호": "100",
                    "사건명": "해고무효확인",
                    "선고일자": "2023.05.12"
                }]
            }
        })
    }

    #[tokio::test]
    async fn search_sends_target_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .and(query_param("OC", "test-oc"))
            .and(query_param("target", "prec"))
            .and(query_param("type", "JSON"))
            .and(query_param("query", "해고"))
            .and(query_param("search", "2"))
            .and(query_param("sort", "ddes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(precedent_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let mut request = SearchRequest::new(Category::Precedent, "해고");
        request.body_search = true;
        request.sort = Some(SortOrder::DateDesc);

        let page = client.search(&request).await.unwrap();

        assert_eq!(page.total, 1);
        assert!(page.documents.iter().all(|d| d.category == Category::Precedent));
        assert_eq!(page.documents[0].title, "해고무효확인");
    }

    #[tokio::test]
    async fn identical_search_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(precedent_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let request = SearchRequest::new(Category::Precedent, "해고");

        let first = client.search(&request).await.unwrap();
        let second = client.clone().search(&request).await.unwrap();

        assert_eq!(first.documents.len(), second.documents.len());
        let stats = client.cache_stats();
        assert_eq!(stats.searches.hits, 1);
        assert_eq!(stats.searches.entries, 1);
    }

    #[tokio::test]
    async fn different_pages_are_cached_separately() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(precedent_body()))
            .expect(2)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let mut request = SearchRequest::new(Category::Precedent, "해고");
        client.search(&request).await.unwrap();
        request.page = 2;
        client.search(&request).await.unwrap();
    }

    #[tokio::test]
    async fn display_is_clamped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .and(query_param("display", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(precedent_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let mut request = SearchRequest::new(Category::Precedent, "해고");
        request.display = 500;
        client.search(&request).await.unwrap();
    }

    #[tokio::test]
    async fn search_429_returns_rate_limited_after_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let result = client
            .search(&SearchRequest::new(Category::Statute, "민법"))
            .await;
        assert!(matches!(result, Err(LawError::RateLimited)));
    }

    #[tokio::test]
    async fn search_html_body_is_unexpected_format() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<!DOCTYPE html><html>error</html>"),
            )
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let result = client
            .search(&SearchRequest::new(Category::Statute, "민법"))
            .await;
        match result {
            Err(LawError::UnexpectedFormat(msg)) => assert!(msg.contains("DOCTYPE")),
            other => panic!("expected UnexpectedFormat, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_errors_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .expect(2)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let request = SearchRequest::new(Category::Statute, "민법");
        for _ in 0..2 {
            let result = client.search(&request).await;
            assert!(matches!(result, Err(LawError::Api { code: 400, .. })));
        }
    }

    #[tokio::test]
    async fn detail_uses_mst_for_statutes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawService.do"))
            .and(query_param("target", "law"))
            .and(query_param("MST", "265959"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "법령": {"기본정보": {"법령명_한글": "근로기준법"}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let detail = client.detail(Category::Statute, "265959").await.unwrap();
        assert_eq!(detail.body["기본정보"]["법령명_한글"], "근로기준법");

        client.detail(Category::Statute, "265959").await.unwrap();
    }

    #[tokio::test]
    async fn precedent_filters_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .and(query_param("target", "prec"))
            .and(query_param("org", "400201"))
            .and(query_param("prncYd", "20200101~20231231"))
            .respond_with(ResponseTemplate::new(200).set_body_json(precedent_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let request = SearchRequest {
            court: Some(Court::Supreme),
            decided: DateRange::parse(Some("2020-01-01"), Some("2023-12-31")).unwrap(),
            ..SearchRequest::new(Category::Precedent, "해고")
        };
        let page = client.search(&request).await.unwrap();
        assert_eq!(page.documents.len(), 1);
    }

    #[tokio::test]
    async fn precedent_filters_are_ignored_for_statutes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .and(query_param("org", "400201"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lawSearch.do"))
            .and(query_param("target", "law"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "LawSearch": {"totalCnt": "0", "page": "1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let request = SearchRequest {
            court: Some(Court::Supreme),
            ..SearchRequest::new(Category::Statute, "민법")
        };
        let page = client.search(&request).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn article_is_fetched_by_jo_code_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawService.do"))
            .and(query_param("target", "lawjosub"))
            .and(query_param("MST", "265307"))
            .and(query_param("JO", "039000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "법령": {
                    "기본정보": {"법령명_한글": "민법"},
                    "조문": {"조문단위": {
                        "조문번호": "390",
                        "조문내용": "제390조(채무불이행과 손해배상) 채무자가 채무의 내용에 좇은 이행을 하지 아니한 때에는 채권자는 손해배상을 청구할 수 있다."
                    }}
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let article = ArticleRef::parse("제390조").unwrap();
        let found = client.article("265307", article).await.unwrap();
        assert!(found.text.starts_with("제390조(채무불이행과 손해배상)"));
        assert_eq!(found.statute_id, "265307");

        client.article("265307", article).await.unwrap();
        assert_eq!(client.cache_stats().articles.hits, 1);
    }

    #[tokio::test]
    async fn missing_article_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lawService.do"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "법령": {"기본정보": {"법령명_한글": "민법"}}
            })))
            .mount(&server)
            .await;

        let client = LawClient::with_base_url(Client::new(), &server.uri());
        let result = client
            .article("265307", ArticleRef::parse("9999").unwrap())
            .await;
        assert!(matches!(result, Err(LawError::NotFound(_))), "got: {result:?}");
    }
}
