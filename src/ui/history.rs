use chrono::{DateTime, Utc};
use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Paragraph, Row, StatefulWidget, Table, TableState, Widget, Wrap,
    },
};
use time_humanize::{Accuracy, HumanTime, Tense};

use certquiz::scoring::analyze_performance;

use super::charting::{format_label, join_or_dash};
use crate::{App, HistoryEntry};

/// "3 minutes ago" style label for a completion time
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(at).num_seconds().max(0);
    if secs < 60 {
        return "just now".to_string();
    }
    HumanTime::from_seconds(secs).to_text_en(Accuracy::Rough, Tense::Past)
}

fn score_color(score: f64, pass_threshold: f64) -> Color {
    if score >= pass_threshold {
        Color::Green
    } else if score >= pass_threshold / 2.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn certification_title(app: &App, certification_id: &str) -> String {
    app.catalog
        .position(certification_id)
        .and_then(|idx| app.catalog.get(idx))
        .map(|(cert, _)| cert.title.clone())
        .unwrap_or_else(|| certification_id.to_string())
}

fn history_row<'a>(app: &App, entry: &HistoryEntry, now: DateTime<Utc>) -> Row<'a> {
    let result = &entry.result;
    Row::new(vec![
        Cell::from(relative_time(result.completed_at, now)),
        Cell::from(certification_title(app, &result.certification_id)),
        Cell::from(format_label(result.overall_score_percent)).style(
            Style::default().fg(score_color(result.overall_score_percent, app.pass_threshold)),
        ),
        Cell::from(result.incorrect_question_ids.len().to_string()),
    ])
}

/// Strong/weak categories and the per-category breakdown of one attempt
pub fn detail_lines<'a>(entry: &HistoryEntry, pass_threshold: f64) -> Vec<Line<'a>> {
    let Some(scores) = &entry.category_scores else {
        return vec![Line::from(Span::styled(
            "No category breakdown stored for this attempt.",
            Style::default().fg(Color::Gray),
        ))];
    };

    let performance = analyze_performance(scores, pass_threshold);
    let breakdown = scores
        .iter()
        .filter(|(_, s)| s.total_answered > 0)
        .map(|(category, s)| {
            format!(
                "{category} {}/{} ({})",
                s.correct_count,
                s.total_answered,
                format_label(s.percent())
            )
        })
        .join("  ·  ");

    vec![
        Line::from(vec![
            Span::styled(
                "strong: ",
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw(join_or_dash(&performance.strong)),
        ]),
        Line::from(vec![
            Span::styled(
                "weak: ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw(join_or_dash(&performance.weak)),
        ]),
        Line::from(Span::styled(
            breakdown,
            Style::default().add_modifier(Modifier::DIM),
        )),
    ]
}

pub fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(format!("Quiz history ({} attempts)", app.history_entries.len()))
        .block(Block::default().borders(Borders::ALL))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let selected = app
        .history_selected
        .min(app.history_entries.len().saturating_sub(1));

    if app.history_entries.is_empty() {
        Paragraph::new("No completed quizzes yet.\nFinish one to see it here!")
            .block(Block::default().borders(Borders::ALL).title("No Data"))
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    } else {
        let now = Utc::now();
        let rows: Vec<Row> = app
            .history_entries
            .iter()
            .map(|entry| history_row(app, entry, now))
            .collect();

        let header = Row::new(vec!["When", "Certification", "Score", "Missed"]).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let table = Table::new(
            rows,
            [
                Constraint::Length(18),
                Constraint::Min(20),
                Constraint::Length(8),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("most recent first"))
        .row_highlight_style(Style::default().bg(Color::DarkGray));

        let mut state = TableState::default().with_selected(Some(selected));
        StatefulWidget::render(table, chunks[1], buf, &mut state);

        let entry = &app.history_entries[selected];
        Paragraph::new(detail_lines(entry, app.pass_threshold))
            .block(Block::default().borders(Borders::ALL).title(format!(
                "{} · {}",
                certification_title(app, &entry.result.certification_id),
                format_label(entry.result.overall_score_percent)
            )))
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled(
        "(↑/↓) select / (b)ack / (esc)ape",
        Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use certquiz::result::QuizResult;
    use certquiz::scoring::CategoryScore;
    use chrono::Duration;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn entry(category_scores: Option<BTreeMap<String, CategoryScore>>) -> HistoryEntry {
        HistoryEntry {
            result: QuizResult {
                id: Uuid::new_v4(),
                certification_id: "aws".to_string(),
                quiz_id: Uuid::new_v4(),
                overall_score_percent: 60.0,
                incorrect_question_ids: vec![],
                completed_at: Utc::now(),
            },
            category_scores,
        }
    }

    fn text(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn test_relative_time_recent() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now + Duration::seconds(5), now), "just now");
    }

    #[test]
    fn test_relative_time_past() {
        let now = Utc::now();
        let label = relative_time(now - Duration::hours(3), now);
        assert!(label.contains("hour"), "{label}");
        assert!(label.contains("ago"), "{label}");
    }

    #[test]
    fn test_score_color() {
        assert_eq!(score_color(80.0, 70.0), Color::Green);
        assert_eq!(score_color(40.0, 70.0), Color::Yellow);
        assert_eq!(score_color(10.0, 70.0), Color::Red);
    }

    #[test]
    fn test_detail_lines_split_by_threshold() {
        let mut scores = BTreeMap::new();
        scores.insert(
            "Compute".to_string(),
            CategoryScore {
                correct_count: 2,
                total_answered: 2,
            },
        );
        scores.insert(
            "Storage".to_string(),
            CategoryScore {
                correct_count: 1,
                total_answered: 2,
            },
        );
        scores.insert("Networking".to_string(), CategoryScore::default());

        let lines = text(&detail_lines(&entry(Some(scores)), 70.0));
        assert_eq!(lines[0], "strong: Compute");
        assert_eq!(lines[1], "weak: Storage");
        assert_eq!(lines[2], "Compute 2/2 (100%)  ·  Storage 1/2 (50%)");
    }

    #[test]
    fn test_detail_lines_without_session() {
        let lines = text(&detail_lines(&entry(None), 70.0));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("No category breakdown"));
    }
}
