use schemars::JsonSchema;
use serde::Deserialize;

use crate::lawapi::{Category, Court, SortOrder};
use crate::search::Service;
use crate::search::engine::Mode;

#[derive(Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search terms, e.g. a statute name or case keywords ("근로기준법", "부당해고")
    pub query: String,
    /// Categories to search: statute, precedent, constitutional, interpretation, admin_appeal, admin_rule, local_ordinance, treaty, legal_term (default: inferred from the query)
    pub categories: Option<Vec<Category>>,
    /// Results per category (1-100, default: 10)
    pub display: Option<u32>,
    /// Result page, starting at 1 (default: 1)
    pub page: Option<u32>,
    /// Match the full text instead of titles only (default: false)
    pub body_search: Option<bool>,
    /// Result order: name_asc, name_desc, date_asc, date_desc, number_asc, number_desc
    pub sort: Option<SortOrder>,
    /// Precedents only: "supreme" (대법원) or "lower" (하급심)
    pub court: Option<Court>,
    /// Precedents only: earliest decision date, YYYY-MM-DD
    pub date_from: Option<String>,
    /// Precedents only: latest decision date, YYYY-MM-DD
    pub date_to: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct AskParams {
    /// Legal question in natural language
    pub question: String,
    /// "auto" (default) classifies the question; "lookup" or "analysis" forces a route
    pub mode: Option<Mode>,
    /// Analysis deliverable: legal_info, contract_review, or legal_opinion. Setting it forces analysis.
    pub service: Option<Service>,
    /// Categories to search (default: inferred for lookups; statute, precedent, interpretation, admin_rule for analysis)
    pub categories: Option<Vec<Category>>,
    /// Background facts for a legal opinion
    pub facts: Option<String>,
    /// Contract text for a contract review
    pub contract_text: Option<String>,
    /// Results per category (1-100, default: 10)
    pub display: Option<u32>,
}

#[derive(Deserialize, JsonSchema)]
pub struct DocumentParams {
    /// Category the document belongs to (e.g. "precedent")
    pub category: Category,
    /// Document id from a search result (statutes use their MST serial number)
    pub id: String,
    /// Statutes only: fetch a single article instead of the whole statute ("390", "제23조의2")
    pub article: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct ClassifyParams {
    /// Question to classify
    pub query: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct StatusParams {
    /// Drop every cached upstream response before reporting (default: false)
    pub clear_cache: Option<bool>,
}
