use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

use certquiz::engine::QuizEngine;
use certquiz::identity::Identity;
use certquiz::persistence::{HistoryStore, PersistenceWorker, SqliteStore};
use certquiz::question_bank::Catalog;
use certquiz::runtime::{AppEvent, FixedTicker, Runner, TestEventSource};
use certquiz::session::Advance;

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

fn enter() -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
}

// Drives a whole quiz through Runner/TestEventSource without a TTY
#[test]
fn headless_quiz_flow_completes() {
    let dir = tempdir().unwrap();
    let catalog = Catalog::bundled().unwrap();
    let set = catalog.question_set("ml").unwrap();
    let history = HistoryStore::with_path(dir.path().join("history.json"));
    let db = dir.path().join("progress.db");
    let worker = PersistenceWorker::spawn(SqliteStore::open(&db).unwrap());

    let mut rng = StdRng::seed_from_u64(42);
    let mut engine = QuizEngine::start("ml", set, Some(Identity::new("headless")), &mut rng)
        .with_persistence(worker.handle())
        .with_history(history.clone());

    // The producer only knows the shuffled order through the engine, so it
    // answers everything with "a" and the assertions work out the score.
    let (tx, rx) = mpsc::channel();
    for _ in 0..engine.state().len() {
        tx.send(key('a')).unwrap();
        tx.send(enter()).unwrap();
    }
    drop(tx);

    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    for _ in 0..200u32 {
        match runner.step() {
            AppEvent::Tick => {
                if engine.is_completed() {
                    break;
                }
                engine.on_tick();
            }
            AppEvent::Resize => {}
            AppEvent::Key(ev) => match ev.code {
                KeyCode::Char(c) => {
                    engine.answer_current(c as usize - 'a' as usize).unwrap();
                }
                KeyCode::Enter => {
                    if let Advance::Completed = engine.advance().unwrap() {
                        break;
                    }
                }
                _ => {}
            },
        }
    }

    assert!(engine.is_completed(), "quiz should have completed");
    let expected_correct = engine
        .state()
        .questions()
        .iter()
        .filter(|q| q.correct_option_index == 0)
        .count();
    let expected = expected_correct as f64 * 100.0 / set.questions.len() as f64;
    assert!((engine.overall_score() - expected).abs() < 1e-9);

    let completion = engine.completion().unwrap().clone();
    assert!(completion.saved_locally);
    assert_eq!(
        completion.records.result.incorrect_question_ids.len(),
        set.questions.len() - expected_correct
    );

    drop(engine);
    worker.shutdown().unwrap();

    // reopen from disk: the user store outlives the worker
    let store = SqliteStore::open(&db).unwrap();
    let results = store.results_for_user("headless").unwrap();
    assert_eq!(results, vec![completion.records.result.clone()]);
    assert_eq!(
        store.answer_count("headless").unwrap(),
        set.questions.len() as i64
    );

    assert_eq!(history.load_history(), vec![completion.records.result]);
}

#[test]
fn headless_invalid_keys_leave_session_untouched() {
    let catalog = Catalog::bundled().unwrap();
    let set = catalog.question_set("azure").unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let mut engine = QuizEngine::start("azure", set, None, &mut rng);

    // option out of range, then advance without an answer
    assert!(engine.answer_current(17).unwrap_err().is_validation());
    assert!(engine.advance().unwrap_err().is_validation());
    assert_eq!(engine.state().current_index(), 0);
    assert_eq!(engine.state().answered_count(), 0);

    engine.answer_current(1).unwrap();
    assert!(engine.answer_current(0).unwrap_err().is_validation());
    assert_eq!(engine.advance().unwrap(), Advance::Next(1));
}
