//! Excerpts of captured stderr for the failure diagnostic.
//!
//! A failing script usually says what went wrong in its first line (the
//! first error logged) and its last lines (the traceback tail). The excerpt
//! keeps both as whole lines and drops what lies between.

/// Default budget for the stderr excerpt in a failure diagnostic.
pub const DEFAULT_MAX_CHARS: usize = 4_000;

/// Shorten `output` to roughly `max_chars` characters.
///
/// The first line is kept (clipped to a quarter of the budget), then as many
/// whole trailing lines as fit. A last line too long to fit whole keeps its
/// end. Cuts are on character boundaries.
pub fn excerpt(output: &str, max_chars: usize) -> String {
    if output.chars().count() <= max_chars {
        return output.to_owned();
    }

    let mut lines = output.lines();
    let first = lines.next().unwrap_or_default();
    let rest: Vec<&str> = lines.collect();

    let head = clip_front(first, max_chars / 4);
    let mut budget = max_chars.saturating_sub(head.chars().count());

    let mut tail = Vec::new();
    for line in rest.iter().rev() {
        let len = line.chars().count() + 1;
        if len > budget {
            break;
        }
        budget -= len;
        tail.push(*line);
    }
    tail.reverse();

    if tail.is_empty() {
        let last = rest.last().copied().unwrap_or(first);
        return format!("{head}\n... [output truncated] ...\n{}", keep_end(last, budget));
    }
    let omitted = rest.len() - tail.len();
    format!("{head}\n... [{omitted} lines omitted] ...\n{}", tail.join("\n"))
}

fn clip_front(line: &str, max_chars: usize) -> String {
    let mut clipped: String = line.chars().take(max_chars).collect();
    if clipped.len() < line.len() {
        clipped.push_str("...");
    }
    clipped
}

fn keep_end(line: &str, max_chars: usize) -> String {
    let skip = line.chars().count().saturating_sub(max_chars);
    line.chars().skip(skip).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_is_unchanged() {
        assert_eq!(excerpt("KeyError: 'close'", 100), "KeyError: 'close'");
        assert_eq!(excerpt("", 100), "");
    }

    #[test]
    fn traceback_keeps_first_and_last_whole_lines() {
        let input = format!(
            "ERROR: no data for 005930\n{}ValueError: no data",
            "  File \"tracker.py\", line 12\n".repeat(500)
        );
        let result = excerpt(&input, 200);

        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines[0], "ERROR: no data for 005930");
        assert!(lines[1].contains("lines omitted"));
        assert_eq!(*lines.last().unwrap(), "ValueError: no data");
        for line in &lines[2..lines.len() - 1] {
            assert_eq!(*line, "  File \"tracker.py\", line 12");
        }
    }

    #[test]
    fn omitted_count_is_exact() {
        // head "line-000" takes 8 of 100; ten 9-char lines fit in the other 92.
        let input: String = (0..100).map(|i| format!("line-{i:03}\n")).collect();
        let result = excerpt(&input, 100);
        assert!(result.starts_with("line-000\n"));
        assert!(result.contains("[89 lines omitted]"));
        assert!(result.ends_with("line-099"));
    }

    #[test]
    fn single_long_line_keeps_both_ends() {
        let input = format!("start{}end", "x".repeat(1_000));
        let result = excerpt(&input, 100);
        assert!(result.starts_with("start"));
        assert!(result.ends_with("end"));
        assert!(result.contains("output truncated"));
    }

    #[test]
    fn multibyte_lines_do_not_panic() {
        let input = "€ 가격 조회 실패\n".repeat(300);
        let result = excerpt(&input, 100);
        assert!(result.ends_with("€ 가격 조회 실패"));
        assert!(result.contains("lines omitted"));
    }
}
