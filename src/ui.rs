pub mod charting;
pub mod history;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use certquiz::util::{format_elapsed, option_letter};

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

/// Lines each incorrect question takes in the results review list
pub const REVIEW_LINES_PER_QUESTION: usize = 5;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        screen::current_screen(&self.state).render(self, area, buf);
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn legend(text: &str) -> Paragraph<'_> {
    Paragraph::new(Span::styled(
        text,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .alignment(Alignment::Center)
}

/// Key legend under a question; option keys follow the option count
fn quiz_legend(options: usize, answered: bool, last: bool) -> String {
    match (answered, last) {
        (false, _) => {
            let n = options.max(1);
            let last_letter = option_letter(n - 1).to_ascii_lowercase();
            format!("(a-{last_letter} / 1-{}) answer / (esc) abandon", n.min(9))
        }
        (true, true) => "(enter) see results / (esc) abandon".to_string(),
        (true, false) => "(enter) next question / (esc) abandon".to_string(),
    }
}

fn render_sign_in(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        "Sign in to track your progress",
        bold().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let input_width = (app.sign_in_input.width() as u16 + 4).clamp(24, area.width.max(24));
    let input_area = centered(chunks[2], input_width);
    Paragraph::new(Line::from(vec![
        Span::styled(app.sign_in_input.as_str(), bold()),
        Span::styled("_", dim().add_modifier(Modifier::SLOW_BLINK)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("user"))
    .render(input_area, buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }

    legend("(enter) sign in / (esc)ape").render(chunks[5], buf);
}

fn render_select(app: &App, area: Rect, buf: &mut Buffer) {
    let certs: Vec<_> = app.catalog.certifications().collect();

    let mut constraints = vec![Constraint::Length(3)];
    constraints.extend(certs.iter().map(|_| Constraint::Length(4)));
    constraints.push(Constraint::Min(0));
    constraints.push(Constraint::Length(1));
    constraints.push(Constraint::Length(1));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints(constraints)
        .split(area);

    let user = app
        .current_user()
        .map(|u| format!("signed in as {}", u.user_id))
        .unwrap_or_default();
    Paragraph::new(vec![
        Line::from(Span::styled(
            "Certification practice",
            bold().fg(Color::Cyan),
        )),
        Line::from(Span::styled(user, dim())),
    ])
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    for (idx, cert) in certs.iter().enumerate() {
        let selected = idx == app.selected;
        let question_count = app
            .catalog
            .question_set(&cert.id)
            .map(|s| s.questions.len())
            .unwrap_or(0);
        let review = app.review_counts.get(&cert.id).copied().unwrap_or(0);

        let border_style = if selected {
            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)
        } else {
            dim()
        };

        let mut meta = format!("{question_count} questions");
        if review > 0 {
            meta.push_str(&format!("  ·  {review} to review"));
        }

        Paragraph::new(vec![
            Line::from(Span::styled(cert.description.as_str(), Style::default())),
            Line::from(Span::styled(meta, dim())),
        ])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled(
                    format!(" {} {} ", cert.icon, cert.title),
                    if selected { bold() } else { Style::default() },
                )),
        )
        .wrap(Wrap { trim: true })
        .render(chunks[idx + 1], buf);
    }

    let n = certs.len();
    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)))
            .alignment(Alignment::Center)
            .render(chunks[n + 2], buf);
    }
    legend("(↑/↓) choose / (enter) start / (h)istory / sign (o)ut / (esc)ape")
        .render(chunks[n + 3], buf);
}

fn render_quiz(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(engine) = &app.engine else {
        return;
    };
    let state = engine.state();
    let Some(question) = state.current_question() else {
        return;
    };
    let answer = state.current_answer();

    let prompt_lines =
        ((question.prompt.width() as f64 / area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1) as f64)
            .ceil() as u16)
            .max(1);
    let explanation_lines = if answer.is_some() { 4 } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1),                       // header
            Constraint::Length(1),                       // progress
            Constraint::Length(1),                       // padding
            Constraint::Length(1),                       // category
            Constraint::Length(prompt_lines + 1),        // prompt
            Constraint::Length(question.options.len() as u16 * 2), // options
            Constraint::Length(explanation_lines),       // explanation
            Constraint::Min(0),
            Constraint::Length(1), // legend
        ])
        .split(area);

    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    Paragraph::new(Span::styled(
        format!("Question {}/{}", state.current_index() + 1, state.len()),
        bold(),
    ))
    .render(header[0], buf);
    Paragraph::new(Span::styled(format_elapsed(state.elapsed_seconds()), dim()))
        .alignment(Alignment::Right)
        .render(header[1], buf);

    let ratio = if state.is_empty() {
        0.0
    } else {
        state.current_index() as f64 / state.len() as f64
    };
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Magenta))
        .ratio(ratio.clamp(0.0, 1.0))
        .label("")
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!("[{}]", question.category),
        Style::default().fg(Color::Cyan),
    ))
    .render(chunks[3], buf);

    Paragraph::new(Span::styled(question.prompt.as_str(), bold()))
        .wrap(Wrap { trim: true })
        .render(chunks[4], buf);

    let option_lines: Vec<Line> = question
        .options
        .iter()
        .enumerate()
        .flat_map(|(idx, option)| {
            let (marker, style) = match answer {
                None => (" ", Style::default()),
                Some(_) if question.is_correct(idx) => ("✓", bold().fg(Color::Green)),
                Some(a) if a.selected_option_index == idx => ("✗", bold().fg(Color::Red)),
                Some(_) => (" ", dim()),
            };
            [
                Line::from(vec![
                    Span::styled(format!("{marker} {}. ", option_letter(idx)), style),
                    Span::styled(option.as_str(), style),
                ]),
                Line::from(""),
            ]
        })
        .collect();
    Paragraph::new(option_lines)
        .wrap(Wrap { trim: false })
        .render(chunks[5], buf);

    if answer.is_some() {
        Paragraph::new(Span::styled(
            question.explanation.as_str(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        ))
        .block(Block::default().borders(Borders::TOP))
        .wrap(Wrap { trim: true })
        .render(chunks[6], buf);
    }

    let text = quiz_legend(
        question.options.len(),
        answer.is_some(),
        state.is_last_question(),
    );
    legend(&text).render(chunks[8], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(engine) = &app.engine else {
        return;
    };
    let score = engine.overall_score();
    let passed = score >= app.pass_threshold;
    let scores = engine.category_scores();
    let performance = certquiz::scoring::analyze_performance(&scores, app.pass_threshold);
    let incorrect = engine.incorrect_questions();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(1)
        .constraints([
            Constraint::Length(2),  // verdict
            Constraint::Length(1),  // score gauge
            Constraint::Length(1),  // notice
            Constraint::Length(10), // chart
            Constraint::Length(2),  // strong/weak
            Constraint::Min(3),     // incorrect questions
            Constraint::Length(1),  // legend
        ])
        .split(area);

    let verdict = if passed {
        Span::styled("Passed!", bold().fg(Color::Green))
    } else {
        Span::styled("Keep practicing", bold().fg(Color::Yellow))
    };
    Paragraph::new(vec![
        Line::from(verdict),
        Line::from(Span::styled(
            format!(
                "{:.1}% over {} answered in {}",
                score,
                engine.state().answered_count(),
                format_elapsed(engine.state().elapsed_seconds())
            ),
            bold(),
        )),
    ])
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    Gauge::default()
        .gauge_style(Style::default().fg(if passed { Color::Green } else { Color::Yellow }))
        .ratio((score / 100.0).clamp(0.0, 1.0))
        .label("")
        .render(chunks[1], buf);

    if let Some(notice) = &app.notice {
        Paragraph::new(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);
    }

    let bars = charting::category_bars(&scores);
    let data: Vec<(&str, u64)> = bars.iter().map(|(l, v)| (l.as_str(), *v)).collect();
    BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("score by category (%)"),
        )
        .data(data.as_slice())
        .bar_width(charting::bar_width(chunks[3].width, bars.len()))
        .bar_gap(2)
        .max(100)
        .bar_style(Style::default().fg(Color::Magenta))
        .value_style(bold().bg(Color::Magenta))
        .render(chunks[3], buf);

    Paragraph::new(vec![
        Line::from(vec![
            Span::styled("strong: ", bold().fg(Color::Green)),
            Span::raw(charting::join_or_dash(&performance.strong)),
        ]),
        Line::from(vec![
            Span::styled("weak:   ", bold().fg(Color::Red)),
            Span::raw(charting::join_or_dash(&performance.weak)),
        ]),
    ])
    .render(chunks[4], buf);

    let lines: Vec<Line> = if incorrect.is_empty() {
        vec![Line::from(Span::styled(
            "Perfect! Every answer was correct.",
            bold().fg(Color::Green),
        ))]
    } else {
        incorrect
            .iter()
            .enumerate()
            .flat_map(|(i, q)| {
                vec![
                    Line::from(Span::styled(
                        format!("{}. {}", i + 1, q.question.prompt),
                        bold(),
                    )),
                    Line::from(Span::styled(
                        format!("   your answer: {}", q.selected_option()),
                        Style::default().fg(Color::Red),
                    )),
                    Line::from(Span::styled(
                        format!("   correct:     {}", q.question.correct_option()),
                        Style::default().fg(Color::Green),
                    )),
                    Line::from(Span::styled(
                        format!("   {}", q.question.explanation),
                        dim().add_modifier(Modifier::ITALIC),
                    )),
                    Line::from(""),
                ]
            })
            .collect()
    };

    let max_scroll = lines.len().saturating_sub(chunks[5].height.saturating_sub(2) as usize);
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(format!(
            "questions to review ({})",
            incorrect.len()
        )))
        .wrap(Wrap { trim: false })
        .scroll((app.results_scroll.min(max_scroll) as u16, 0))
        .render(chunks[5], buf);

    legend("(r)etry / (n)ew / (h)istory / (↑/↓) scroll / (esc)ape").render(chunks[6], buf);
}

fn centered(area: Rect, width: u16) -> Rect {
    let width = width.min(area.width);
    Rect {
        x: area.x + (area.width - width) / 2,
        width,
        ..area
    }
}
