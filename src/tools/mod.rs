mod errors;
mod params;

pub use params::{AskParams, ClassifyParams, DocumentParams, SearchParams, StatusParams};

use std::time::Duration;

use reqwest::Client;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use tracing::{info, warn};

use errors::{ask_to_mcp_error, law_to_mcp_error};

use crate::cache::{CacheConfig, CacheStats};
use crate::lawapi::{ArticleRef, Category, DateRange, LawClient, LawError, LegalSource};
use crate::markdown::sanitize_heading;
use crate::openai::OpenAiClient;
use crate::search::engine::{self, AskAnswer, AskRequest, SearchOptions};
use crate::search::{QueryKind, analyze, classify};

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Global HTTP client timeout. Completions for long analyses are the slowest calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(90);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;
const DEFAULT_DISPLAY: u32 = 10;
const MAX_DISPLAY: u32 = 100;
const MAX_DOCUMENT_OUTPUT_CHARS: usize = 100_000;

/// MCP server handler providing Korean legal search and analysis tools.
///
/// Configuration via environment variables:
/// - `LAW_API_KEY`: law.go.kr OC key, enables every tool that touches the legal database
/// - `OPENAI_API_KEY`: enables analysis answers in `legal_ask` (optional)
/// - `OPENAI_MODEL`: chat model for analysis (default: gpt-4o-mini)
#[derive(Clone)]
pub struct LexGate {
    law: Option<LawClient>,
    openai: Option<OpenAiClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl LexGate {
    pub fn new(cache: CacheConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(HTTP_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        let law = LawClient::from_env(http.clone(), cache)
            .inspect_err(|e| warn!("legal database client not available: {e}"))
            .ok();
        let openai = OpenAiClient::from_env(http, cache)
            .inspect_err(|e| warn!("OpenAI client not available: {e}"))
            .ok();
        Ok(Self {
            law,
            openai,
            tool_router: Self::tool_router(),
        })
    }

    fn law(&self) -> Result<&LawClient, McpError> {
        self.law
            .as_ref()
            .ok_or_else(|| law_to_mcp_error(LawError::ApiKeyNotSet))
    }

    #[tool(
        name = "legal_search",
        description = "Search the Korean national legal database (law.go.kr) across several document categories at once: statutes, precedents, Constitutional Court decisions, statutory interpretations, administrative appeal rulings, administrative rules, local ordinances, treaties, and legal terms. Categories are searched in parallel; a failing category is reported without failing the whole search. Precedents can be filtered by court level and decision date. Returns a Markdown report with links."
    )]
    async fn legal_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(McpError::invalid_params("query must not be empty", None));
        }

        info!(query = %query, "tool:legal_search");

        let law = self.law()?;
        let decided = DateRange::parse(params.date_from.as_deref(), params.date_to.as_deref())
            .map_err(law_to_mcp_error)?;

        let categories = match params.categories.filter(|c| !c.is_empty()) {
            Some(categories) => categories,
            None => analyze(query).targets,
        };
        let opts = SearchOptions {
            display: params.display.unwrap_or(DEFAULT_DISPLAY).clamp(1, MAX_DISPLAY),
            page: params.page.unwrap_or(1).max(1),
            body_search: params.body_search.unwrap_or(false),
            sort: params.sort,
            court: params.court,
            decided,
        };

        let report = engine::unified_search(law, query, &categories, &opts)
            .await
            .map_err(law_to_mcp_error)?;

        info!(
            categories = report.results.len(),
            failed = report.failed.len(),
            documents = report.document_count(),
            "legal_search complete"
        );

        let output = engine::format_report(&report);
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        name = "legal_ask",
        description = "Answer a legal question in natural language. The question is classified: lookups (\"근로기준법 판례 검색\") return ranked documents from the legal database; analysis questions (\"해고 통보를 받았는데 어떻게 대응해야 하나요?\") retrieve statutes, precedents, interpretations and administrative rules and synthesize an answer with OpenAI. Supports contract review (pass contract_text) and legal opinions (pass facts)."
    )]
    async fn legal_ask(
        &self,
        Parameters(params): Parameters<AskParams>,
    ) -> Result<CallToolResult, McpError> {
        let question = params.question.trim();
        if question.is_empty() {
            return Err(McpError::invalid_params("question must not be empty", None));
        }

        info!(question = %question, mode = ?params.mode, "tool:legal_ask");

        let law = self.law()?;

        let request = AskRequest {
            question,
            mode: params.mode.unwrap_or_default(),
            service: params.service,
            categories: params.categories.as_deref().filter(|c| !c.is_empty()),
            facts: params.facts.as_deref(),
            contract_text: params.contract_text.as_deref(),
            display: params.display.unwrap_or(DEFAULT_DISPLAY).clamp(1, MAX_DISPLAY),
        };

        let outcome = engine::ask(law, self.openai.as_ref(), &request)
            .await
            .map_err(ask_to_mcp_error)?;

        match &outcome.answer {
            AskAnswer::Lookup { ranked, article } => info!(
                ranked = ranked.len(),
                article = article.is_some(),
                top_score = ranked.first().map(|r| r.score),
                intent = ?outcome.analysis.intent,
                domain = outcome.analysis.domain,
                "legal_ask complete (lookup)"
            ),
            AskAnswer::Analysis { service, text } => info!(
                service = service.label(),
                chars = text.chars().count(),
                references = outcome.report.document_count(),
                "legal_ask complete (analysis)"
            ),
        }

        let output = engine::format_outcome(&outcome, question);
        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        name = "legal_document",
        description = "Fetch the full record of one document from the legal database by category and id (the id shown in legal_search results; statutes use their MST serial number). Returns the record as JSON. For statutes, pass article (e.g. \"제390조\") to fetch just that article's text."
    )]
    async fn legal_document(
        &self,
        Parameters(params): Parameters<DocumentParams>,
    ) -> Result<CallToolResult, McpError> {
        let id = params.id.trim();
        if id.is_empty() {
            return Err(McpError::invalid_params("id must not be empty", None));
        }

        info!(
            category = params.category.target(),
            id = %id,
            article = params.article.as_deref(),
            "tool:legal_document"
        );

        if let Some(article) = params.article.as_deref() {
            if params.category != Category::Statute {
                return Err(McpError::invalid_params(
                    "article is only supported for the statute category",
                    None,
                ));
            }
            let number = ArticleRef::parse(article).map_err(law_to_mcp_error)?;
            let found = self
                .law()?
                .article(id, number)
                .await
                .map_err(law_to_mcp_error)?;
            let output = format!(
                "# {} {} {}\n\n{}\n",
                Category::Statute.label(),
                sanitize_heading(&found.statute_id),
                found.article,
                found.text
            );
            return Ok(CallToolResult::success(vec![Content::text(output)]));
        }

        let detail = self
            .law()?
            .detail(params.category, id)
            .await
            .map_err(law_to_mcp_error)?;

        let json = serde_json::to_string_pretty(&detail.body)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let mut output = format!(
            "# {} {}\n\n```json\n{json}",
            detail.category.label(),
            sanitize_heading(&detail.id)
        );
        if output.len() > MAX_DOCUMENT_OUTPUT_CHARS {
            let end = output.floor_char_boundary(MAX_DOCUMENT_OUTPUT_CHARS);
            output.truncate(end);
            output.push_str("\n(truncated)");
        }
        output.push_str("\n```\n");

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        name = "classify_query",
        description = "Classify a legal question without calling any external service: whether it is a lookup or needs analysis (and which kind), plus the detected intent, keywords, cited statutes and articles, amounts, dates, legal domain, and the document categories worth searching."
    )]
    async fn classify_query(
        &self,
        Parameters(params): Parameters<ClassifyParams>,
    ) -> Result<CallToolResult, McpError> {
        info!(query = %params.query, "tool:classify_query");

        let classification = classify(&params.query);
        let analysis = analyze(&params.query);
        let (kind, service) = match classification.kind {
            QueryKind::Lookup => ("lookup", None),
            QueryKind::Analysis(service) => ("analysis", Some(service)),
        };

        let value = serde_json::json!({
            "kind": kind,
            "service": service,
            "reason": classification.reason,
            "search_query": analysis.primary_query(),
            "analysis": analysis,
        });
        let output = serde_json::to_string_pretty(&value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }

    #[tool(
        name = "status",
        description = "Report which upstream services are configured (legal database, OpenAI), the searchable document categories, and response cache statistics. Optionally clears the response caches."
    )]
    async fn status(
        &self,
        Parameters(params): Parameters<StatusParams>,
    ) -> Result<CallToolResult, McpError> {
        let clear = params.clear_cache.unwrap_or(false);
        info!(clear, "tool:status");

        if clear {
            if let Some(law) = &self.law {
                law.clear_cache();
            }
            if let Some(openai) = &self.openai {
                openai.clear_cache();
            }
        }

        let mut output = String::from("# lexgate status\n\n");
        output.push_str(&format!("- Version: {}\n", env!("CARGO_PKG_VERSION")));
        match &self.law {
            Some(_) => output.push_str("- Legal database (law.go.kr): configured\n"),
            None => output.push_str("- Legal database (law.go.kr): not configured (set LAW_API_KEY)\n"),
        }
        match &self.openai {
            Some(openai) => output.push_str(&format!("- OpenAI: configured (model {})\n", openai.model())),
            None => output.push_str("- OpenAI: not configured (set OPENAI_API_KEY)\n"),
        }

        output.push_str("\n## Categories\n\n");
        for category in Category::ALL {
            let name = serde_json::to_value(category)
                .ok()
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_default();
            output.push_str(&format!("- `{name}`: {}\n", category.label()));
        }

        let mut rows = Vec::new();
        if let Some(law) = &self.law {
            let stats = law.cache_stats();
            rows.push(("Legal searches", stats.searches));
            rows.push(("Legal documents", stats.details));
            rows.push(("Statute articles", stats.articles));
        }
        if let Some(openai) = &self.openai {
            rows.push(("OpenAI answers", openai.cache_stats()));
        }
        if !rows.is_empty() {
            output.push_str("\n## Cache\n\n| Cache | Entries | Hits | Misses |\n|---|---|---|---|\n");
            for (name, CacheStats { hits, misses, entries }) in rows {
                output.push_str(&format!("| {name} | {entries} | {hits} | {misses} |\n"));
            }
        }

        Ok(CallToolResult::success(vec![Content::text(output)]))
    }
}

#[tool_handler]
impl ServerHandler for LexGate {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "lexgate".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "lexgate provides Korean legal research over the national legal database (law.go.kr): unified multi-category search (legal_search), full document records (legal_document), question answering with AI analysis (legal_ask), offline question classification (classify_query), and a health check (status). Answers are reference material, not legal advice."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
