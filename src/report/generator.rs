//! Leaderboard report generation.
//!
//! This module renders a [`Leaderboard`] as Markdown or JSON for the
//! one-shot `--once` mode.

use crate::models::{Completeness, Leaderboard};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(board: &Leaderboard) -> String {
    let mut output = String::new();

    output.push_str(&format!("# Closed-Won Leaderboard - {}\n\n", board.period));
    output.push_str(&generate_metadata_section(board));
    output.push_str(&generate_rankings_section(board));

    output
}

/// Generate the metadata section.
fn generate_metadata_section(board: &Leaderboard) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "- **Generated:** {}\n",
        board.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Data:** {}\n", board.completeness));
    if let Some(ref error) = board.error {
        section.push_str(&format!("- **Upstream error:** {}\n", error));
    }
    section.push('\n');

    section
}

/// Generate the ranking table.
fn generate_rankings_section(board: &Leaderboard) -> String {
    let mut section = String::new();

    if board.rows.is_empty() {
        let note = match board.completeness {
            Completeness::Failed => "No results: the deal fetch failed.",
            _ => "No closed-won deals this month yet.",
        };
        section.push_str(note);
        section.push_str("\n");
        return section;
    }

    section.push_str("| # | Name | Sales |\n");
    section.push_str("|---:|:---|---:|\n");
    for (rank, row) in board.rows.iter().enumerate() {
        section.push_str(&format!(
            "| {} | {} | {} |\n",
            rank + 1,
            row.name,
            format_amount(row.sales)
        ));
    }
    section.push_str(&format!(
        "| | **Total** | **{}** |\n",
        format_amount(board.total())
    ));

    section
}

/// Format with two decimals and thousands separators.
fn format_amount(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

/// Generate a JSON report.
pub fn generate_json_report(board: &Leaderboard) -> Result<String> {
    serde_json::to_string_pretty(board).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportingPeriod, SalesRow};
    use chrono::Utc;

    fn create_test_board() -> Leaderboard {
        Leaderboard {
            period: ReportingPeriod::new(2026, 10),
            generated_at: Utc::now(),
            completeness: Completeness::Complete,
            error: None,
            rows: vec![
                SalesRow::new("noha", 1500.0),
                SalesRow::new("bela", 900.0),
                SalesRow::new("sohaila", 500.0),
            ],
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_board());

        assert!(markdown.contains("# Closed-Won Leaderboard - 2026-10"));
        assert!(markdown.contains("| 1 | noha | 1,500.00 |"));
        assert!(markdown.contains("| 3 | sohaila | 500.00 |"));
        assert!(markdown.contains("**2,900.00**"));
        assert!(markdown.contains("**Data:** complete"));
    }

    #[test]
    fn test_failed_board_markdown() {
        let board = Leaderboard {
            completeness: Completeness::Failed,
            error: Some("CRM API error 500: boom".to_string()),
            rows: vec![],
            ..create_test_board()
        };
        let markdown = generate_markdown_report(&board);

        assert!(markdown.contains("Upstream error:** CRM API error 500"));
        assert!(markdown.contains("the deal fetch failed"));
        assert!(!markdown.contains("| # |"));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(350.0), "350.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-1000.5), "-1,000.50");
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_board()).unwrap();

        assert!(json.contains("\"completeness\": \"complete\""));
        assert!(json.contains("\"Name\": \"noha\""));
        assert!(!json.contains("\"error\""));
    }
}
