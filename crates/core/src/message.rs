//! Plain-text preview generation for chat-style destinations.

const TRUNCATION_MARKER: &str = "...";

/// Render a plain-text preview bounded by both a line count and a byte
/// budget, never splitting mid-line.
///
/// The line bound is applied first, then lines are dropped from the end
/// until the byte budget (including the truncation marker) holds. Whenever
/// anything was dropped, a `"..."` marker line is appended.
pub fn suggested_truncated_message(text: &str, max_lines: usize, max_bytes: usize) -> String {
    let all_lines: Vec<&str> = text.lines().collect();
    let mut truncated = all_lines.len() > max_lines;
    let mut kept: Vec<&str> = all_lines.into_iter().take(max_lines).collect();

    loop {
        let body_len: usize = if kept.is_empty() {
            0
        } else {
            kept.iter().map(|l| l.len()).sum::<usize>() + kept.len() - 1
        };
        let marker_len = if truncated {
            TRUNCATION_MARKER.len() + usize::from(!kept.is_empty())
        } else {
            0
        };
        if body_len + marker_len <= max_bytes {
            break;
        }
        if kept.is_empty() {
            // Even the marker alone does not fit.
            return String::new();
        }
        kept.pop();
        truncated = true;
    }

    let mut out = kept.join("\n");
    if truncated {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(TRUNCATION_MARKER);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_text_passes_through() {
        assert_eq!(suggested_truncated_message("a\nb", 10, 100), "a\nb");
    }

    #[test]
    fn line_bound_applies_first() {
        let out = suggested_truncated_message("a\nb\nc\nd", 2, 100);
        assert_eq!(out, "a\nb\n...");
    }

    #[test]
    fn byte_bound_drops_whole_lines() {
        // "aaaa\nbbbb" is 9 bytes; budget of 9 with marker forces dropping
        // the second line rather than splitting it.
        let out = suggested_truncated_message("aaaa\nbbbb\ncccc", 10, 9);
        assert_eq!(out, "aaaa\n...");
    }

    #[test]
    fn oversized_first_line_yields_marker_only() {
        let out = suggested_truncated_message("aaaaaaaaaaaaaaaa", 5, 8);
        assert_eq!(out, "...");
    }

    #[test]
    fn nothing_fits() {
        assert_eq!(suggested_truncated_message("aaaa", 5, 2), "");
    }

    #[test]
    fn exact_fit_is_not_truncated() {
        assert_eq!(suggested_truncated_message("ab\ncd", 2, 5), "ab\ncd");
    }
}
