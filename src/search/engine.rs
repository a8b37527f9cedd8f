use futures::future::join_all;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::classify::{Classification, QueryKind, Service, classify};
use super::intent::{QueryAnalysis, analyze};
use super::prompt::{PromptInput, build_prompt};
use crate::lawapi::{
    Article, ArticleRef, Category, Court, DateRange, Document, LawError, LegalSource,
    SearchRequest, SortOrder,
};
use crate::markdown::{escape_md_link, excerpt, sanitize_heading};
use crate::openai::{CompletionClient, OpenAiError};

/// Categories searched for analysis context unless the caller names others.
pub const ANALYSIS_CATEGORIES: [Category; 4] = [
    Category::Statute,
    Category::Precedent,
    Category::Interpretation,
    Category::AdminRule,
];

const MAX_RANKED: usize = 50;
const REPORT_SUMMARY_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub display: u32,
    pub page: u32,
    pub body_search: bool,
    pub sort: Option<SortOrder>,
    /// Precedent filters; other categories ignore them.
    pub court: Option<Court>,
    pub decided: Option<DateRange>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            display: 10,
            page: 1,
            body_search: false,
            sort: None,
            court: None,
            decided: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryResults {
    pub category: Category,
    pub total: u64,
    pub page: u32,
    pub documents: Vec<Document>,
}

#[derive(Debug)]
pub struct FailedCategory {
    pub category: Category,
    pub reason: String,
}

#[derive(Debug)]
pub struct SearchReport {
    pub query: String,
    pub results: Vec<CategoryResults>,
    pub failed: Vec<FailedCategory>,
}

impl SearchReport {
    pub fn document_count(&self) -> usize {
        self.results.iter().map(|r| r.documents.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub score: u32,
    pub document: Document,
}

/// Routing override for [`ask`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Auto,
    Lookup,
    Analysis,
}

pub struct AskRequest<'a> {
    pub question: &'a str,
    pub mode: Mode,
    /// Forces analysis with this deliverable.
    pub service: Option<Service>,
    pub categories: Option<&'a [Category]>,
    pub facts: Option<&'a str>,
    pub contract_text: Option<&'a str>,
    pub display: u32,
}

/// Text of an article cited in a lookup question.
#[derive(Debug, Clone)]
pub struct CitedArticle {
    pub statute: String,
    pub article: Article,
}

#[derive(Debug)]
pub enum AskAnswer {
    Lookup {
        ranked: Vec<RankedDocument>,
        article: Option<CitedArticle>,
    },
    Analysis { service: Service, text: String },
}

#[derive(Debug)]
pub struct AskOutcome {
    pub classification: Classification,
    pub analysis: QueryAnalysis,
    pub search_query: String,
    pub report: SearchReport,
    pub answer: AskAnswer,
}

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("{0}")]
    Law(#[from] LawError),
    #[error("{0}")]
    Completion(#[from] OpenAiError),
}

fn dedup_categories(categories: &[Category]) -> Vec<Category> {
    let mut unique = Vec::with_capacity(categories.len());
    for c in categories {
        if !unique.contains(c) {
            unique.push(*c);
        }
    }
    unique
}

async fn fan_out(
    source: &impl LegalSource,
    query: &str,
    categories: &[Category],
    opts: &SearchOptions,
) -> (Vec<CategoryResults>, Vec<(Category, LawError)>) {
    let requests: Vec<SearchRequest> = dedup_categories(categories)
        .into_iter()
        .map(|category| SearchRequest {
            page: opts.page,
            display: opts.display,
            body_search: opts.body_search,
            sort: opts.sort,
            court: opts.court,
            decided: opts.decided.clone(),
            ..SearchRequest::new(category, query)
        })
        .collect();

    let outcomes = join_all(requests.iter().map(|r| source.search(r))).await;

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (request, outcome) in requests.iter().zip(outcomes) {
        match outcome {
            Ok(page) => results.push(CategoryResults {
                category: page.category,
                total: page.total,
                page: page.page,
                documents: page.documents,
            }),
            Err(e) => {
                warn!(
                    target = request.category.target(),
                    error = %e,
                    "category search failed (continuing with other categories)"
                );
                failures.push((request.category, e));
            }
        }
    }
    (results, failures)
}

/// Searches every category concurrently. Per-category failures are recorded in the
/// report instead of failing the whole search.
pub async fn search_categories(
    source: &impl LegalSource,
    query: &str,
    categories: &[Category],
    opts: &SearchOptions,
) -> SearchReport {
    let (results, failures) = fan_out(source, query, categories, opts).await;
    SearchReport {
        query: query.to_string(),
        results,
        failed: failures
            .into_iter()
            .map(|(category, e)| FailedCategory {
                category,
                reason: e.to_string(),
            })
            .collect(),
    }
}

/// Like [`search_categories`], but fails with the first error when no category succeeded.
pub async fn unified_search(
    source: &impl LegalSource,
    query: &str,
    categories: &[Category],
    opts: &SearchOptions,
) -> Result<SearchReport, LawError> {
    let (results, mut failures) = fan_out(source, query, categories, opts).await;

    if results.is_empty() && !failures.is_empty() {
        let (_, first) = failures.swap_remove(0);
        return Err(first);
    }

    Ok(SearchReport {
        query: query.to_string(),
        results,
        failed: failures
            .into_iter()
            .map(|(category, e)| FailedCategory {
                category,
                reason: e.to_string(),
            })
            .collect(),
    })
}

/// Classifies the question, then answers it with ranked search results or with an AI
/// synthesis over retrieved documents.
pub async fn ask<C: CompletionClient>(
    source: &impl LegalSource,
    llm: Option<&C>,
    request: &AskRequest<'_>,
) -> Result<AskOutcome, AskError> {
    let classification = classify(request.question);
    let analysis = analyze(request.question);
    let search_query = analysis.primary_query();

    let kind = match (request.mode, request.service) {
        (Mode::Lookup, _) => QueryKind::Lookup,
        (_, Some(service)) => QueryKind::Analysis(service),
        (Mode::Analysis, None) => match classification.kind {
            QueryKind::Analysis(service) => QueryKind::Analysis(service),
            QueryKind::Lookup => QueryKind::Analysis(Service::default()),
        },
        (Mode::Auto, None) => classification.kind,
    };

    info!(
        kind = ?kind,
        reason = %classification.reason,
        search_query = %search_query,
        "question routed"
    );

    match kind {
        QueryKind::Lookup => {
            let cited = analysis
                .entities
                .statutes
                .first()
                .zip(analysis.entities.articles.first().copied());
            let mut categories = request
                .categories
                .map_or_else(|| analysis.targets.clone(), <[Category]>::to_vec);
            if request.categories.is_none()
                && cited.is_some()
                && !categories.contains(&Category::Statute)
            {
                categories.insert(0, Category::Statute);
            }
            let opts = SearchOptions {
                display: request.display,
                sort: analysis.recent.then_some(SortOrder::DateDesc),
                ..SearchOptions::default()
            };
            let mut report = unified_search(source, &search_query, &categories, &opts).await?;
            let ranked = rank(&report, &analysis);

            let mut article = None;
            if let Some((statute, number)) = cited {
                match fetch_cited_article(source, &report, statute, number).await {
                    Ok(found) => article = found,
                    Err(e) => {
                        warn!(statute = %statute, article = %number, error = %e, "article fetch failed");
                        report.failed.push(FailedCategory {
                            category: Category::Statute,
                            reason: format!("{statute} {number}: {e}"),
                        });
                    }
                }
            }

            Ok(AskOutcome {
                classification,
                analysis,
                search_query,
                report,
                answer: AskAnswer::Lookup { ranked, article },
            })
        }
        QueryKind::Analysis(service) => {
            let llm = llm.ok_or(OpenAiError::ApiKeyNotSet)?;
            let categories = request.categories.unwrap_or(&ANALYSIS_CATEGORIES);
            let opts = SearchOptions {
                display: request.display,
                ..SearchOptions::default()
            };
            let report = search_categories(source, &search_query, categories, &opts).await;
            if report.results.is_empty() && !report.failed.is_empty() {
                warn!("every context search failed; analysing without reference materials");
            }

            let prompt = build_prompt(&PromptInput {
                service,
                question: request.question,
                facts: request.facts,
                contract_text: request.contract_text,
                context: &report.results,
            });
            let text = llm.complete(&prompt.system, &prompt.user).await?;

            Ok(AskOutcome {
                classification,
                analysis,
                search_query,
                report,
                answer: AskAnswer::Analysis { service, text },
            })
        }
    }
}

/// Fetches `number` from the statute search result titled `statute`, or from the first
/// statute result when no title matches exactly.
async fn fetch_cited_article(
    source: &impl LegalSource,
    report: &SearchReport,
    statute: &str,
    number: ArticleRef,
) -> Result<Option<CitedArticle>, LawError> {
    let statutes: Vec<&Document> = report
        .results
        .iter()
        .filter(|r| r.category == Category::Statute)
        .flat_map(|r| &r.documents)
        .collect();
    let Some(doc) = statutes
        .iter()
        .find(|d| d.title == statute)
        .or(statutes.first())
    else {
        return Ok(None);
    };
    let Some(mst) = &doc.id else {
        return Ok(None);
    };
    let article = source.article(mst, number).await?;
    Ok(Some(CitedArticle {
        statute: doc.title.clone(),
        article,
    }))
}

/// Orders every retrieved document by keyword relevance: 10 points per keyword in the
/// title, 2 per keyword in the summary, 3 when the category is one the question targets.
pub fn rank(report: &SearchReport, analysis: &QueryAnalysis) -> Vec<RankedDocument> {
    let mut ranked: Vec<RankedDocument> = report
        .results
        .iter()
        .flat_map(|r| r.documents.iter())
        .map(|doc| {
            let mut score = 0;
            for kw in &analysis.keywords {
                if doc.title.contains(kw.as_str()) {
                    score += 10;
                }
                if doc.summary.as_deref().is_some_and(|s| s.contains(kw.as_str())) {
                    score += 2;
                }
            }
            if analysis.targets.contains(&doc.category) {
                score += 3;
            }
            RankedDocument {
                score,
                document: doc.clone(),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(MAX_RANKED);
    ranked
}

fn document_line(doc: &Document) -> String {
    let title = escape_md_link(&doc.title);
    let mut line = match &doc.link {
        Some(link) => format!("- [{title}]({})", escape_md_link(link)),
        None => format!("- {title}"),
    };
    if let Some(date) = &doc.date {
        line.push_str(&format!(" · {date}"));
    }
    if let Some(id) = &doc.id {
        line.push_str(&format!(" · id {id}"));
    }
    line.push('\n');
    line
}

fn summary_block(doc: &Document) -> String {
    let Some(summary) = &doc.summary else {
        return String::new();
    };
    format!("  > {}\n", excerpt(summary, REPORT_SUMMARY_CHARS))
}

fn push_failures(output: &mut String, failed: &[FailedCategory]) {
    if failed.is_empty() {
        return;
    }
    output.push_str("## Failed categories\n\n");
    for f in failed {
        output.push_str(&format!("- {} ({})\n", f.category.label(), f.reason));
    }
    output.push('\n');
}

pub fn format_report(report: &SearchReport) -> String {
    let mut output = format!("# Legal search: {}\n\n", sanitize_heading(&report.query));

    if report.document_count() == 0 {
        output.push_str("No documents found.\n\n");
    }

    for results in report.results.iter().filter(|r| !r.documents.is_empty()) {
        output.push_str(&format!(
            "## {} ({} of {}",
            results.category.label(),
            results.documents.len(),
            results.total
        ));
        if results.page > 1 {
            output.push_str(&format!(", page {}", results.page));
        }
        output.push_str(")\n\n");
        for doc in &results.documents {
            output.push_str(&document_line(doc));
            output.push_str(&summary_block(doc));
        }
        output.push('\n');
    }

    push_failures(&mut output, &report.failed);
    output
}

pub fn format_outcome(outcome: &AskOutcome, question: &str) -> String {
    let mut output = format!("# {}\n\n", sanitize_heading(question));

    match &outcome.answer {
        AskAnswer::Lookup { ranked, article } => {
            output.push_str(&format!(
                "> Routed to lookup ({}). Searched for \"{}\".\n\n",
                outcome.classification.reason, outcome.search_query
            ));
            if let Some(cited) = article {
                output.push_str(&format!(
                    "## {} {}\n\n{}\n\n",
                    sanitize_heading(&cited.statute),
                    cited.article.article,
                    cited.article.text.trim()
                ));
            }
            if ranked.is_empty() {
                output.push_str("No documents found.\n\n");
            } else {
                output.push_str("## Top matches\n\n");
                for r in ranked {
                    output.push_str(&format!("**{}** ", r.document.category.label()));
                    output.push_str(document_line(&r.document).trim_start_matches("- "));
                    output.push_str(&summary_block(&r.document));
                }
                output.push('\n');
            }
        }
        AskAnswer::Analysis { service, text } => {
            output.push_str(&format!(
                "> Routed to {} analysis ({}).\n\n",
                service.label(),
                outcome.classification.reason
            ));
            output.push_str(text.trim());
            output.push_str("\n\n");

            if outcome.report.document_count() > 0 {
                output.push_str("---\n\n## Reference materials\n\n");
                for results in outcome.report.results.iter().filter(|r| !r.documents.is_empty()) {
                    output.push_str(&format!("### {}\n\n", results.category.label()));
                    for doc in &results.documents {
                        output.push_str(&document_line(doc));
                    }
                    output.push('\n');
                }
            }
        }
    }

    push_failures(&mut output, &outcome.report.failed);
    output
}
