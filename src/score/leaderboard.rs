//! Leaderboard ranking and rendering.
//!
//! Pure: rows in, formatted text out. Callers decide whether to print or
//! capture the result, which is what keeps this unit-testable with literal
//! fixtures.

use crate::store::AgentResultRow;

/// Ordinal rank label: "1st", "2nd", "3rd", then "{n}th".
pub fn rank_label(rank: usize) -> String {
    match rank {
        1 => "1st".to_string(),
        2 => "2nd".to_string(),
        3 => "3rd".to_string(),
        n => format!("{}th", n),
    }
}

/// Rank rows by composite score, descending, preserving input order on ties.
///
/// Returns references into the input; the stable sort is what guarantees
/// tie order.
pub fn rank(rows: &[AgentResultRow]) -> Vec<&AgentResultRow> {
    let mut ranked: Vec<&AgentResultRow> = rows.iter().collect();
    ranked.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Render the ranked leaderboard as display text.
pub fn render(title: &str, rows: &[AgentResultRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Leaderboard: {} ===\n", title));
    if rows.is_empty() {
        out.push_str("(no agents)\n");
        return out;
    }
    for (i, row) in rank(rows).iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<24} composite {:>10.3}  secondary {:>10.3}  {:>8.1}s",
            rank_label(i + 1),
            row.agent,
            row.composite_score,
            row.secondary_metric,
            row.duration_secs,
        ));
        if !row.error.is_empty() {
            out.push_str(&format!("  [{}]", row.error));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::agent::AgentKind;
    use crate::score::CanonicalRow;

    fn row(agent: &str, composite: f64) -> AgentResultRow {
        AgentResultRow::scored(
            agent,
            AgentKind::Codex,
            1.0,
            "",
            CanonicalRow {
                composite_score: composite,
                secondary_metric: 0.0,
            },
        )
    }

    #[test]
    fn test_rank_labels() {
        assert_eq!(rank_label(1), "1st");
        assert_eq!(rank_label(2), "2nd");
        assert_eq!(rank_label(3), "3rd");
        assert_eq!(rank_label(4), "4th");
        assert_eq!(rank_label(11), "11th");
    }

    #[test]
    fn test_sorted_descending() {
        let rows = vec![row("a", 1.0), row("b", 3.0), row("c", 2.0)];
        let ranked = rank(&rows);
        let names: Vec<&str> = ranked.iter().map(|r| r.agent.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        // Non-increasing from rank 1 downward.
        for pair in ranked.windows(2) {
            assert!(pair[0].composite_score >= pair[1].composite_score);
        }
    }

    #[test]
    fn test_ties_preserve_input_order() {
        let rows = vec![row("first", 5.0), row("second", 5.0), row("third", 5.0)];
        let ranked = rank(&rows);
        let names: Vec<&str> = ranked.iter().map(|r| r.agent.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_one_row_per_agent_even_failed() {
        let rows = vec![
            AgentResultRow::fallback("a", AgentKind::Codex, 0.0, "launch failure"),
            AgentResultRow::fallback("b", AgentKind::ClaudeCode, 0.0, "score timeout"),
        ];
        let text = render("stag-hunt", &rows);
        assert!(text.contains("a"));
        assert!(text.contains("b"));
        assert!(text.contains("launch failure"));
        assert_eq!(text.lines().count(), 3); // header + one line per agent
    }

    #[test]
    fn test_render_empty() {
        let text = render("stag-hunt", &[]);
        assert!(text.contains("(no agents)"));
    }
}
