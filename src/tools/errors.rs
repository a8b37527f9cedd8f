use rmcp::ErrorData as McpError;

use crate::lawapi::LawError;
use crate::openai::OpenAiError;
use crate::search::engine::AskError;

pub(super) fn retriable_error(e: &impl std::fmt::Display) -> McpError {
    McpError::internal_error(format!("{e} (retriable)"), None)
}

pub(super) fn law_to_mcp_error(e: LawError) -> McpError {
    match &e {
        LawError::ApiKeyNotSet | LawError::NotFound(_) | LawError::InvalidRequest(_) => {
            McpError::invalid_params(e.to_string(), None)
        }
        LawError::RateLimited => retriable_error(&e),
        LawError::Api { code, .. } if *code >= 500 => retriable_error(&e),
        _ => McpError::internal_error(e.to_string(), None),
    }
}

pub(super) fn openai_to_mcp_error(e: OpenAiError) -> McpError {
    match &e {
        OpenAiError::ApiKeyNotSet => McpError::invalid_params(e.to_string(), None),
        OpenAiError::Unauthorized(_) => McpError::invalid_params(
            format!("{e}. Check that OPENAI_API_KEY is valid"),
            None,
        ),
        OpenAiError::RateLimited => retriable_error(&e),
        OpenAiError::QuotaExhausted(_) => McpError::invalid_params(
            format!("{e}. Check your OpenAI billing at https://platform.openai.com/account/billing"),
            None,
        ),
        _ => McpError::internal_error(e.to_string(), None),
    }
}

pub(super) fn ask_to_mcp_error(e: AskError) -> McpError {
    match e {
        AskError::Law(e) => law_to_mcp_error(e),
        AskError::Completion(e) => openai_to_mcp_error(e),
    }
}
