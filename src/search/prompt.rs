//! Prompt construction for AI legal analysis.

use super::classify::Service;
use super::engine::CategoryResults;
use crate::lawapi::Category;
use crate::markdown::excerpt;

const SUMMARY_CHARS: usize = 200;

const SYSTEM_PROMPT: &str = "\
You are a Korean legal research assistant. Work like a careful lawyer: establish the facts, \
spot the issues, state the governing rules, apply them, and weigh the risks.

Rules:
- Ground every legal statement in the reference materials supplied with the question \
(statutes, precedents, Constitutional Court decisions, administrative rules, local \
ordinances, statutory interpretations, administrative appeal rulings, treaties).
- Cite the material you rely on by its title and date. Never invent statutes, article \
numbers, case numbers, or holdings that are not in the materials; say so when the \
materials are insufficient.
- Answer in the language of the question.
- End with this notice: \"This is AI-generated reference material, not legal advice. \
Consult a qualified attorney about your specific situation.\"";

pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub struct PromptInput<'a> {
    pub service: Service,
    pub question: &'a str,
    pub facts: Option<&'a str>,
    pub contract_text: Option<&'a str>,
    pub context: &'a [CategoryResults],
}

pub fn build_prompt(input: &PromptInput<'_>) -> Prompt {
    let materials = format_context(input.context);
    let materials = if materials.is_empty() {
        "(no matching documents were found in the legal database)".to_string()
    } else {
        materials
    };

    let user = match input.service {
        Service::LegalInfo => format!(
            "## Question\n{question}\n\n\
             ## Requested format\n\
             1. Key answer (three-line summary)\n\
             2. Relevant statutes, including enforcement decrees and rules\n\
             3. Relevant precedents\n\
             4. Administrative interpretation (statutory interpretations, administrative rules, rulings)\n\
             5. Practical advice and points to check\n\n\
             ## Reference materials\n{materials}",
            question = input.question,
        ),
        Service::ContractReview => format!(
            "## Review request\n{question}\n\n\
             ## Contract text\n{contract}\n\n\
             ## Requested format\n\
             1. Summary of the contract and overall risk\n\
             2. Clause-by-clause issues, each rated High, Medium or Low risk\n\
             3. Unfair or one-sided terms and the legal basis for challenging them\n\
             4. Suggested revisions with replacement wording\n\
             5. Negotiation points\n\n\
             ## Reference materials\n{materials}",
            question = input.question,
            contract = input
                .contract_text
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("(not provided; review based on the request above)"),
        ),
        Service::LegalOpinion => format!(
            "## Questions presented\n{question}\n\n\
             ## Facts\n{facts}\n\n\
             ## Requested format (IRAC)\n\
             1. Issues\n\
             2. Rules: statutes, precedents and interpretations that govern each issue\n\
             3. Application of the rules to the facts, favourable and unfavourable points\n\
             4. Conclusion with a risk assessment\n\
             5. At least two courses of action with their legal, cost and time trade-offs\n\n\
             ## Reference materials\n{materials}",
            question = input.question,
            facts = input
                .facts
                .filter(|t| !t.trim().is_empty())
                .unwrap_or("(not provided)"),
        ),
    };

    Prompt {
        system: SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Renders search results as reference material: one heading per category, up to five
/// statutes or precedents and three documents of every other category.
pub fn format_context(context: &[CategoryResults]) -> String {
    let mut sections = Vec::new();

    for results in context.iter().filter(|r| !r.documents.is_empty()) {
        let limit = match results.category {
            Category::Statute | Category::Precedent => 5,
            _ => 3,
        };
        let mut section = format!("### {}\n", results.category.label());
        for doc in results.documents.iter().take(limit) {
            section.push_str(&format!("- {}", doc.title));
            if let Some(date) = &doc.date {
                section.push_str(&format!(" ({date})"));
            }
            section.push('\n');
            if let Some(summary) = &doc.summary {
                section.push_str(&format!("  {}\n", excerpt(summary, SUMMARY_CHARS)));
            }
        }
        sections.push(section);
    }

    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lawapi::Document;

    fn doc(category: Category, title: &str, summary: Option<&str>) -> Document {
        Document {
            category,
            id: None,
            title: title.into(),
            date: Some("2023.05.12".into()),
            summary: summary.map(String::from),
            link: None,
            fields: Default::default(),
        }
    }

    fn results(category: Category, n: usize) -> CategoryResults {
        CategoryResults {
            category,
            total: n as u64,
            page: 1,
            documents: (0..n)
                .map(|i| doc(category, &format!("{category:?} {i}"), None))
                .collect(),
        }
    }

    #[test]
    fn context_limits_documents_per_category() {
        let text = format_context(&[results(Category::Precedent, 8), results(Category::AdminRule, 8)]);
        assert!(text.contains("Precedent 4"));
        assert!(!text.contains("Precedent 5"));
        assert!(text.contains("AdminRule 2"));
        assert!(!text.contains("AdminRule 3"));
        assert!(text.contains("### Precedents"));
        assert!(text.contains("### Administrative rules"));
    }

    #[test]
    fn context_truncates_summaries() {
        let long = "가".repeat(300);
        let ctx = [CategoryResults {
            category: Category::Precedent,
            total: 1,
            page: 1,
            documents: vec![doc(Category::Precedent, "손해배상", Some(&long))],
        }];
        let text = format_context(&ctx);
        assert!(text.contains(&format!("{}...", "가".repeat(200))));
        assert!(!text.contains(&"가".repeat(201)));
        assert!(text.contains("- 손해배상 (2023.05.12)"));
    }

    #[test]
    fn context_skips_empty_categories() {
        let text = format_context(&[results(Category::Treaty, 0)]);
        assert!(text.is_empty());
    }

    #[test]
    fn legal_info_prompt_includes_question_and_materials() {
        let ctx = [results(Category::Statute, 1)];
        let prompt = build_prompt(&PromptInput {
            service: Service::LegalInfo,
            question: "음주운전 처벌 기준은?",
            facts: None,
            contract_text: None,
            context: &ctx,
        });
        assert!(prompt.system.contains("Never invent"));
        assert!(prompt.user.contains("음주운전 처벌 기준은?"));
        assert!(prompt.user.contains("Statute 0"));
    }

    #[test]
    fn empty_context_is_stated() {
        let prompt = build_prompt(&PromptInput {
            service: Service::LegalInfo,
            question: "q",
            facts: None,
            contract_text: None,
            context: &[],
        });
        assert!(prompt.user.contains("no matching documents"));
    }

    #[test]
    fn contract_review_embeds_contract_text() {
        let prompt = build_prompt(&PromptInput {
            service: Service::ContractReview,
            question: "독소조항 검토",
            facts: None,
            contract_text: Some("제1조 (목적) ..."),
            context: &[],
        });
        assert!(prompt.user.contains("제1조 (목적)"));
        assert!(prompt.user.contains("High, Medium or Low"));
    }

    #[test]
    fn legal_opinion_marks_missing_facts() {
        let prompt = build_prompt(&PromptInput {
            service: Service::LegalOpinion,
            question: "소송 가능성",
            facts: Some("   "),
            contract_text: None,
            context: &[],
        });
        assert!(prompt.user.contains("## Facts\n(not provided)"));
    }
}
