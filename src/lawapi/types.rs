use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::LawError;
use super::category::{Category, Court, SortOrder};

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub category: Category,
    pub query: String,
    pub page: u32,
    pub display: u32,
    /// Search document bodies instead of titles only.
    pub body_search: bool,
    pub sort: Option<SortOrder>,
    /// Precedent searches only.
    pub court: Option<Court>,
    /// Precedent decision dates, inclusive.
    pub decided: Option<DateRange>,
}

impl SearchRequest {
    pub fn new(category: Category, query: impl Into<String>) -> Self {
        Self {
            category,
            query: query.into(),
            page: 1,
            display: 10,
            body_search: false,
            sort: None,
            court: None,
            decided: None,
        }
    }
}

/// One retrieved record. `fields` carries the upstream record verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub category: Category,
    pub id: Option<String>,
    pub title: String,
    pub date: Option<String>,
    pub summary: Option<String>,
    pub link: Option<String>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchPage {
    pub category: Category,
    pub total: u64,
    pub page: u32,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    pub category: Category,
    pub id: String,
    pub body: Value,
}

/// Statute article number: 제390조 is `{ number: 390, branch: 0 }`, 제23조의2 is
/// `{ number: 23, branch: 2 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ArticleRef {
    pub number: u32,
    pub branch: u32,
}

impl ArticleRef {
    const MAX_NUMBER: u32 = 9999;
    const MAX_BRANCH: u32 = 99;

    pub fn new(number: u32, branch: u32) -> Option<Self> {
        ((1..=Self::MAX_NUMBER).contains(&number) && branch <= Self::MAX_BRANCH)
            .then_some(Self { number, branch })
    }

    /// Accepts `390`, `제390조`, `23의2` and `제23조의2`.
    pub fn parse(text: &str) -> Result<Self, LawError> {
        let invalid = || LawError::InvalidRequest(format!("invalid article number: {text:?}"));
        if !text
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || matches!(c, '제' | '조' | '의'))
        {
            return Err(invalid());
        }
        let numbers: Vec<u32> = text
            .split(|c: char| !c.is_ascii_digit())
            .filter(|run| !run.is_empty())
            .map(|run| run.parse().map_err(|_| invalid()))
            .collect::<Result<_, _>>()?;
        let article = match numbers[..] {
            [number] => Self::new(number, 0),
            [number, branch] => Self::new(number, branch),
            _ => None,
        };
        article.ok_or_else(invalid)
    }

    /// Six-digit `JO` parameter: four digits of article, two of branch.
    pub fn jo_code(self) -> String {
        format!("{:04}{:02}", self.number, self.branch)
    }
}

impl fmt::Display for ArticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "제{}조", self.number)?;
        if self.branch > 0 {
            write!(f, "의{}", self.branch)?;
        }
        Ok(())
    }
}

/// Inclusive `YYYYMMDD` range. An open end defaults to the earliest or latest date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    from: String,
    to: String,
}

impl DateRange {
    const EARLIEST: &'static str = "00010101";
    const LATEST: &'static str = "99991231";

    /// Accepts `20230512`, `2023-05-12` or `2023.05.12` for either bound. Returns `None`
    /// when both bounds are absent.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Result<Option<Self>, LawError> {
        if from.is_none() && to.is_none() {
            return Ok(None);
        }
        let from = from.map(compact_date).transpose()?;
        let to = to.map(compact_date).transpose()?;
        let range = Self {
            from: from.unwrap_or_else(|| Self::EARLIEST.to_string()),
            to: to.unwrap_or_else(|| Self::LATEST.to_string()),
        };
        if range.from > range.to {
            return Err(LawError::InvalidRequest(format!(
                "date range starts after it ends: {} > {}",
                range.from, range.to
            )));
        }
        Ok(Some(range))
    }

    /// `prncYd` parameter value.
    pub fn param(&self) -> String {
        format!("{}~{}", self.from, self.to)
    }
}

fn compact_date(text: &str) -> Result<String, LawError> {
    let invalid = || LawError::InvalidRequest(format!("invalid date: {text:?} (use YYYY-MM-DD)"));
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | '/' | ' '))
        .collect();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let month: u32 = digits[4..6].parse().map_err(|_| invalid())?;
    let day: u32 = digits[6..8].parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid());
    }
    Ok(digits)
}

/// Text of a single statute article.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    /// Statute serial number (`MST`).
    pub statute_id: String,
    pub article: ArticleRef,
    pub text: String,
}
