use ratatui::{buffer::Buffer, layout::Rect};

use crate::{App, AppState};

/// A UI screen boundary: one per app state
pub trait Screen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer);
}

pub struct SignInScreen;

impl Screen for SignInScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        super::render_sign_in(app, area, buf);
    }
}

pub struct SelectScreen;

impl Screen for SelectScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        super::render_select(app, area, buf);
    }
}

pub struct QuizScreen;

impl Screen for QuizScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        super::render_quiz(app, area, buf);
    }
}

pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        super::render_results(app, area, buf);
    }
}

pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, app: &App, area: Rect, buf: &mut Buffer) {
        super::history::render_history(app, area, buf);
    }
}

pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::SignIn => Box::new(SignInScreen),
        AppState::Select => Box::new(SelectScreen),
        AppState::Quiz => Box::new(QuizScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::History => Box::new(HistoryScreen),
    }
}
