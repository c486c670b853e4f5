pub mod ui;

use certquiz::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    engine::QuizEngine,
    history_api::{HistoryApi, STATUS_OK},
    identity::{Identity, IdentityProvider, LocalIdentityProvider},
    logging::init_file_logger,
    persistence::{HistoryStore, PersistenceHandle, PersistenceWorker, Reply, SqliteStore},
    question_bank::{BankSource, Catalog},
    result::{QuizResult, QuizSession},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner, SecondClock},
    scoring::CategoryScore,
    session::Advance,
};
use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use log::LevelFilter;
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    collections::{BTreeMap, HashMap},
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::mpsc::TryRecvError,
    time::{Duration, Instant},
};

const TICK_RATE_MS: u64 = 100;
const MAX_USER_ID_LEN: usize = 64;

/// terminal practice quizzes for certification exams
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Practice certification exams in the terminal: shuffled questions, instant feedback with explanations, per-category scores and a persistent result history."
)]
pub struct Cli {
    /// certification to preselect (e.g. aws, azure, node, ml)
    #[clap(short = 'c', long)]
    certification: Option<String>,

    /// sign in as this user
    #[clap(short = 'u', long)]
    user: Option<String>,

    /// directory with certifications.json and question files, instead of the bundled banks
    #[clap(long)]
    bank_dir: Option<PathBuf>,

    /// percentage needed to pass and to count a category as strong
    #[clap(short = 't', long)]
    pass_threshold: Option<f64>,

    /// print the stored result history as JSON and exit
    #[clap(long)]
    history: bool,

    /// verbosity of the log file
    #[clap(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum AppState {
    SignIn,
    Select,
    Quiz,
    Results,
    History,
}

/// One attempt on the history screen. Category scores come from the user's
/// stored session and are missing for summary-only records.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub result: QuizResult,
    pub category_scores: Option<BTreeMap<String, CategoryScore>>,
}

/// Local summaries enriched with the matching sessions, most recent first
pub fn merge_history(local: Vec<QuizResult>, sessions: Vec<QuizSession>) -> Vec<HistoryEntry> {
    let mut entries: Vec<HistoryEntry> = local
        .into_iter()
        .map(|result| HistoryEntry {
            result,
            category_scores: None,
        })
        .collect();

    for session in sessions {
        match entries.iter_mut().find(|e| e.result.id == session.result.id) {
            Some(entry) => entry.category_scores = Some(session.category_scores),
            None => entries.push(HistoryEntry {
                result: session.result,
                category_scores: Some(session.category_scores),
            }),
        }
    }

    entries.sort_by(|a, b| b.result.completed_at.cmp(&a.result.completed_at));
    entries
}

pub struct App {
    pub catalog: Catalog,
    pub selected: usize,
    pub state: AppState,
    pub engine: Option<QuizEngine>,
    pub sign_in_input: String,
    pub history_entries: Vec<HistoryEntry>,
    pub history_selected: usize,
    pub results_scroll: usize,
    pub review_counts: HashMap<String, usize>,
    pub pass_threshold: f64,
    pub notice: Option<String>,
    identity: Box<dyn IdentityProvider>,
    persistence: Option<PersistenceHandle>,
    history: HistoryStore,
    history_return: AppState,
    pending_reviews: Vec<(String, Reply<Vec<String>>)>,
    pending_sessions: Option<Reply<Vec<QuizSession>>>,
    clock: SecondClock,
    rng: StdRng,
}

impl App {
    pub fn new(
        catalog: Catalog,
        identity: Box<dyn IdentityProvider>,
        history: HistoryStore,
        persistence: Option<PersistenceHandle>,
        pass_threshold: f64,
    ) -> Self {
        let state = if identity.current_user().is_some() {
            AppState::Select
        } else {
            AppState::SignIn
        };

        let mut app = Self {
            catalog,
            selected: 0,
            state,
            engine: None,
            sign_in_input: String::new(),
            history_entries: Vec::new(),
            history_selected: 0,
            results_scroll: 0,
            review_counts: HashMap::new(),
            pass_threshold,
            notice: None,
            identity,
            persistence,
            history,
            history_return: state,
            pending_reviews: Vec::new(),
            pending_sessions: None,
            clock: SecondClock::new(Instant::now()),
            rng: StdRng::from_entropy(),
        };
        app.refresh_review_counts();
        app
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Preselect a certification by id; false if the catalog has no such entry
    pub fn select_certification(&mut self, certification_id: &str) -> bool {
        match self.catalog.position(certification_id) {
            Some(idx) => {
                self.selected = idx;
                true
            }
            None => false,
        }
    }

    pub fn selected_certification_id(&self) -> Option<String> {
        self.catalog
            .get(self.selected)
            .map(|(cert, _)| cert.id.clone())
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.identity.current_user()
    }

    /// Queue review queries; counts shown so far stay until the replies arrive
    fn refresh_review_counts(&mut self) {
        self.pending_reviews.clear();
        let (Some(user), Some(persistence)) = (self.current_user(), &self.persistence) else {
            return;
        };

        for cert in self.catalog.certifications() {
            match persistence.request_questions_to_review(&user.user_id, &cert.id) {
                Ok(reply) => self.pending_reviews.push((cert.id.clone(), reply)),
                Err(e) => {
                    log::warn!("could not list questions to review for {}: {e}", cert.id);
                    return;
                }
            }
        }
    }

    pub fn has_pending_queries(&self) -> bool {
        !self.pending_reviews.is_empty() || self.pending_sessions.is_some()
    }

    /// Pick up any persistence replies that arrived; true if something changed
    pub fn poll_persistence(&mut self) -> bool {
        let mut changed = false;

        let mut still_pending = Vec::new();
        for (certification_id, reply) in self.pending_reviews.drain(..) {
            match reply.try_recv() {
                Ok(Ok(ids)) => {
                    self.review_counts.insert(certification_id, ids.len());
                    changed = true;
                }
                Ok(Err(e)) => {
                    log::warn!("could not list questions to review for {certification_id}: {e}")
                }
                Err(TryRecvError::Empty) => still_pending.push((certification_id, reply)),
                Err(TryRecvError::Disconnected) => {
                    log::warn!("review query for {certification_id} was dropped")
                }
            }
        }
        self.pending_reviews = still_pending;

        match self.pending_sessions.as_ref().map(|reply| reply.try_recv()) {
            Some(Ok(Ok(sessions))) => {
                let local = self.history_entries.drain(..).map(|e| e.result).collect();
                self.history_entries = merge_history(local, sessions);
                self.pending_sessions = None;
                changed = true;
            }
            Some(Ok(Err(e))) => {
                log::warn!("could not load stored sessions: {e}");
                self.pending_sessions = None;
            }
            Some(Err(TryRecvError::Disconnected)) => self.pending_sessions = None,
            Some(Err(TryRecvError::Empty)) | None => {}
        }

        changed
    }

    pub fn start_quiz(&mut self) {
        let user = match self.identity.require_user() {
            Ok(user) => user,
            Err(e) => {
                self.notice = Some(format!("{e}: sign in to start a quiz"));
                self.state = AppState::SignIn;
                return;
            }
        };

        let Some((cert, set)) = self.catalog.get(self.selected) else {
            return;
        };

        let mut engine = QuizEngine::start(&cert.id, set, Some(user), &mut self.rng)
            .with_history(self.history.clone());
        if let Some(persistence) = &self.persistence {
            engine = engine.with_persistence(persistence.clone());
        }

        self.engine = Some(engine);
        self.clock = SecondClock::new(Instant::now());
        self.results_scroll = 0;
        self.notice = None;
        self.state = AppState::Quiz;
    }

    fn finish_quiz(&mut self) {
        self.state = AppState::Results;
        self.notice = match self.engine.as_ref().and_then(|e| e.completion()) {
            Some(c) if !c.saved_locally => {
                Some("result could not be saved to the local history (see log)".to_string())
            }
            _ => None,
        };
        self.refresh_review_counts();
    }

    fn open_history(&mut self) {
        self.history_entries = merge_history(self.history.load_history(), Vec::new());
        self.history_selected = 0;
        self.history_return = self.state;
        self.state = AppState::History;

        self.pending_sessions = None;
        if let (Some(user), Some(persistence)) = (self.current_user(), &self.persistence) {
            match persistence.request_sessions(&user.user_id) {
                Ok(reply) => self.pending_sessions = Some(reply),
                Err(e) => log::warn!("could not load stored sessions: {e}"),
            }
        }
    }

    fn max_results_scroll(&self) -> usize {
        self.engine
            .as_ref()
            .map(|e| e.incorrect_questions().len() * ui::REVIEW_LINES_PER_QUESTION)
            .unwrap_or(0)
            .saturating_sub(1)
    }

    /// Poll persistence replies and credit elapsed seconds to a running quiz;
    /// true when a redraw is needed
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let polled = self.poll_persistence();
        let secs = self.clock.take_seconds(now);
        if self.state != AppState::Quiz || secs == 0 {
            return polled;
        }
        match &mut self.engine {
            Some(engine) if !engine.is_completed() => {
                for _ in 0..secs {
                    engine.on_tick();
                }
                true
            }
            _ => polled,
        }
    }

    /// Returns false when the app should exit
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return false;
        }

        match self.state {
            AppState::SignIn => self.on_sign_in_key(key),
            AppState::Select => self.on_select_key(key),
            AppState::Quiz => self.on_quiz_key(key),
            AppState::Results => self.on_results_key(key),
            AppState::History => self.on_history_key(key),
        }
    }

    fn on_sign_in_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Backspace => {
                self.sign_in_input.pop();
            }
            KeyCode::Enter => match self.identity.sign_in(&self.sign_in_input) {
                Ok(user) => {
                    log::info!("signed in as {}", user.user_id);
                    self.sign_in_input.clear();
                    self.notice = None;
                    self.state = AppState::Select;
                    self.refresh_review_counts();
                }
                Err(e) => self.notice = Some(e.to_string()),
            },
            KeyCode::Char(c) if !c.is_control() => {
                if self.sign_in_input.chars().count() < MAX_USER_ID_LEN {
                    self.sign_in_input.push(c);
                }
            }
            _ => {}
        }
        true
    }

    fn on_select_key(&mut self, key: KeyEvent) -> bool {
        let count = self.catalog.len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return false,
            KeyCode::Up | KeyCode::Char('k') if count > 0 => {
                self.selected = (self.selected + count - 1) % count;
            }
            KeyCode::Down | KeyCode::Char('j') if count > 0 => {
                self.selected = (self.selected + 1) % count;
            }
            KeyCode::Enter => self.start_quiz(),
            KeyCode::Char('h') => self.open_history(),
            KeyCode::Char('o') => {
                self.identity.sign_out();
                self.review_counts.clear();
                self.pending_reviews.clear();
                self.notice = None;
                self.state = AppState::SignIn;
            }
            _ => {}
        }
        true
    }

    fn on_quiz_key(&mut self, key: KeyEvent) -> bool {
        let Some(engine) = &mut self.engine else {
            self.state = AppState::Select;
            return true;
        };

        match key.code {
            KeyCode::Esc => {
                log::info!(
                    "abandoned '{}' quiz at question {}",
                    engine.certification_id(),
                    engine.state().current_index() + 1
                );
                self.engine = None;
                self.notice = None;
                self.state = AppState::Select;
            }
            KeyCode::Char(c) => {
                if let Some(option) = option_for_key(c) {
                    match engine.answer_current(option) {
                        Ok(_) => self.notice = None,
                        Err(e) if e.is_validation() => log::debug!("ignored answer key: {e}"),
                        Err(e) => log::error!("answer failed: {e}"),
                    }
                }
            }
            KeyCode::Enter | KeyCode::Right => match engine.advance() {
                Ok(Advance::Next(_)) => self.notice = None,
                Ok(Advance::Completed) | Ok(Advance::AlreadyCompleted) => self.finish_quiz(),
                Err(e) => self.notice = Some(e.to_string()),
            },
            _ => {}
        }
        true
    }

    fn on_results_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return false,
            KeyCode::Char('r') => self.start_quiz(),
            KeyCode::Char('n') | KeyCode::Enter => {
                self.engine = None;
                self.notice = None;
                self.state = AppState::Select;
            }
            KeyCode::Char('h') => self.open_history(),
            KeyCode::Up => self.results_scroll = self.results_scroll.saturating_sub(1),
            KeyCode::Down => {
                self.results_scroll = (self.results_scroll + 1).min(self.max_results_scroll())
            }
            KeyCode::PageUp => self.results_scroll = self.results_scroll.saturating_sub(10),
            KeyCode::PageDown => {
                self.results_scroll = (self.results_scroll + 10).min(self.max_results_scroll())
            }
            _ => {}
        }
        true
    }

    fn on_history_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('b') | KeyCode::Backspace => self.state = self.history_return,
            KeyCode::Up => self.history_selected = self.history_selected.saturating_sub(1),
            KeyCode::Down => {
                if self.history_selected + 1 < self.history_entries.len() {
                    self.history_selected += 1;
                }
            }
            KeyCode::Home => self.history_selected = 0,
            _ => {}
        }
        true
    }
}

/// `a`-`z` or `1`-`9` pick the option at that position
fn option_for_key(c: char) -> Option<usize> {
    match c.to_ascii_lowercase() {
        l @ 'a'..='z' => Some(l as usize - 'a' as usize),
        d @ '1'..='9' => Some(d as usize - '1' as usize),
        _ => None,
    }
}

fn init_logging(level: LogLevel) {
    if level == LogLevel::Off {
        return;
    }
    if let Some(path) = AppDirs::log_path() {
        if let Err(e) = init_file_logger(&path, level.as_filter()) {
            eprintln!("could not set up logging to {}: {e}", path.display());
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let config_store = FileConfigStore::new();
    let config = config_store.load();

    let source = cli
        .bank_dir
        .clone()
        .or_else(|| config.bank_dir.clone())
        .map(BankSource::Directory)
        .unwrap_or(BankSource::Bundled);
    let catalog = match Catalog::load(&source) {
        Ok(catalog) => catalog,
        Err(e) => {
            log::error!("could not load question banks: {e}");
            Cli::command()
                .error(ErrorKind::InvalidValue, format!("could not load question banks: {e}"))
                .exit();
        }
    };

    let history = HistoryStore::new();

    if cli.history {
        let resp = HistoryApi::new(&history).get_history();
        println!("{}", serde_json::to_string_pretty(&resp.body)?);
        if resp.status != STATUS_OK {
            return Err(format!("history request failed with status {}", resp.status).into());
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let pass_threshold = Config {
        pass_threshold: cli.pass_threshold.unwrap_or(config.pass_threshold),
        ..config.clone()
    }
    .pass_threshold();

    let worker = match SqliteStore::open_default() {
        Ok(store) => Some(PersistenceWorker::spawn(store)),
        Err(e) => {
            log::warn!("progress store unavailable, continuing without it: {e}");
            None
        }
    };

    let identity = LocalIdentityProvider::with_user(config_store.clone(), cli.user.clone());
    let mut app = App::new(
        catalog,
        Box::new(identity),
        history,
        worker.as_ref().map(|w| w.handle()),
        pass_threshold,
    );

    if let Some(id) = cli.certification.clone().or(config.certification.clone()) {
        if !app.select_certification(&id) {
            if cli.certification.is_some() {
                let mut cmd = Cli::command();
                cmd.error(
                    ErrorKind::InvalidValue,
                    format!("unknown certification '{id}'"),
                )
                .exit();
            }
            log::warn!("remembered certification '{id}' is no longer available");
        }
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(worker) = worker {
        worker.shutdown();
    }

    let cfg = Config {
        certification: app.selected_certification_id(),
        ..config_store.load()
    };
    if let Err(e) = config_store.save(&cfg) {
        log::warn!("could not save config: {e}");
    }

    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        let redraw = match runner.step() {
            AppEvent::Tick => app.on_tick(Instant::now()),
            AppEvent::Resize => true,
            AppEvent::Key(key) => {
                if !app.on_key(key) {
                    break;
                }
                true
            }
        };

        if redraw {
            terminal.draw(|f| f.render_widget(&*app, f.area()))?;
        }
    }

    Ok(())
}
