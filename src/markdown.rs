//! Helpers for the Markdown returned by the tools.

/// Escape characters that break Markdown link syntax: `[`, `]`, `(`, `)`.
/// Case names and statute titles often contain parentheses.
pub(crate) fn escape_md_link(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '[' | ']' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Replaces line breaks so user input stays inside one heading line.
pub(crate) fn sanitize_heading(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Collapses whitespace and cuts `text` to at most `max` characters, marking the cut with `...`.
pub(crate) fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_case_name_parentheses() {
        assert_eq!(escape_md_link("근로기준법"), "근로기준법");
        assert_eq!(
            escape_md_link("해고무효확인(부당해고)[2023다1]"),
            r"해고무효확인\(부당해고\)\[2023다1\]"
        );
    }

    #[test]
    fn heading_is_single_line() {
        assert_eq!(sanitize_heading("민법\n제390조\r설명"), "민법 제390조 설명");
    }

    #[test]
    fn excerpt_collapses_and_cuts_on_char_boundaries() {
        assert_eq!(excerpt("채무불이행\n\n  손해배상", 100), "채무불이행 손해배상");
        assert_eq!(excerpt("가나다라마", 3), "가나다...");
        assert_eq!(excerpt("가나다", 3), "가나다");
    }
}
