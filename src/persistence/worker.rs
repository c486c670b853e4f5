use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use super::PersistenceGateway;
use crate::error::PersistenceError;
use crate::result::{QuizResult, QuizSession};
use crate::session::AnswerRecord;

/// Fire-and-forget writes handed to the worker
#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceCommand {
    RecordAnswer {
        user_id: String,
        certification_id: String,
        answer: AnswerRecord,
    },
    RecordProgress {
        user_id: String,
        certification_id: String,
        question_id: String,
        is_correct: bool,
    },
    SaveResult {
        user_id: String,
        result: QuizResult,
    },
    SaveSession(Box<QuizSession>),
}

/// Pending answer to a query; poll it with `try_recv` or block with `recv`
pub type Reply<T> = Receiver<Result<T, PersistenceError>>;

enum Message {
    Command(PersistenceCommand),
    ListQuestionsToReview {
        user_id: String,
        certification_id: String,
        reply: Sender<Result<Vec<String>, PersistenceError>>,
    },
    ListSessions {
        user_id: String,
        reply: Sender<Result<Vec<QuizSession>, PersistenceError>>,
    },
    Shutdown,
}

/// Cheap, clonable sender side of a running worker
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: Sender<Message>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Message::Command(cmd) => write!(f, "Command({cmd:?})"),
            Message::ListQuestionsToReview { user_id, .. } => {
                write!(f, "ListQuestionsToReview({user_id})")
            }
            Message::ListSessions { user_id, .. } => write!(f, "ListSessions({user_id})"),
            Message::Shutdown => write!(f, "Shutdown"),
        }
    }
}

impl PersistenceHandle {
    /// Queue a write; never blocks, failures only reach the log
    pub fn dispatch(&self, cmd: PersistenceCommand) {
        if let Err(mpsc::SendError(Message::Command(cmd))) = self.tx.send(Message::Command(cmd)) {
            log::warn!("persistence worker gone, dropping {}", describe(&cmd));
        }
    }

    /// Queue a review query; the reply arrives after every write queued before it
    pub fn request_questions_to_review(
        &self,
        user_id: &str,
        certification_id: &str,
    ) -> Result<Reply<Vec<String>>, PersistenceError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(Message::ListQuestionsToReview {
                user_id: user_id.to_string(),
                certification_id: certification_id.to_string(),
                reply,
            })
            .map_err(|_| PersistenceError::WorkerGone)?;
        Ok(rx)
    }

    /// Ask the worker for the user's questions to review and wait for the answer
    pub fn list_questions_to_review(
        &self,
        user_id: &str,
        certification_id: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        self.request_questions_to_review(user_id, certification_id)?
            .recv()
            .map_err(|_| PersistenceError::WorkerGone)?
    }

    /// Queue a query for the user's detailed sessions
    pub fn request_sessions(&self, user_id: &str) -> Result<Reply<Vec<QuizSession>>, PersistenceError> {
        let (reply, rx) = mpsc::channel();
        self.tx
            .send(Message::ListSessions {
                user_id: user_id.to_string(),
                reply,
            })
            .map_err(|_| PersistenceError::WorkerGone)?;
        Ok(rx)
    }
}

/// Owns a gateway on a background thread and applies commands in arrival order
pub struct PersistenceWorker<G: PersistenceGateway + 'static> {
    handle: PersistenceHandle,
    thread: Option<JoinHandle<G>>,
}

impl<G: PersistenceGateway + 'static> PersistenceWorker<G> {
    pub fn spawn(gateway: G) -> Self {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("persistence".to_string())
            .spawn(move || run(gateway, rx))
            .map_err(|e| log::error!("could not start persistence worker: {e}"))
            .ok();

        Self {
            handle: PersistenceHandle { tx },
            thread,
        }
    }

    pub fn handle(&self) -> PersistenceHandle {
        self.handle.clone()
    }

    /// Drain queued commands, stop the thread and hand the gateway back
    pub fn shutdown(mut self) -> Option<G> {
        let _ = self.handle.tx.send(Message::Shutdown);
        self.thread.take().and_then(|t| t.join().ok())
    }
}

fn run<G: PersistenceGateway>(mut gateway: G, rx: Receiver<Message>) -> G {
    for msg in rx.iter() {
        match msg {
            Message::Command(cmd) => {
                if let Err(e) = apply(&mut gateway, &cmd) {
                    log::warn!("{} failed: {e}", describe(&cmd));
                }
            }
            Message::ListQuestionsToReview {
                user_id,
                certification_id,
                reply,
            } => {
                let _ = reply.send(gateway.list_questions_to_review(&user_id, &certification_id));
            }
            Message::ListSessions { user_id, reply } => {
                let _ = reply.send(gateway.list_sessions(&user_id));
            }
            Message::Shutdown => break,
        }
    }
    log::debug!("persistence worker stopped");
    gateway
}

fn apply<G: PersistenceGateway>(
    gateway: &mut G,
    cmd: &PersistenceCommand,
) -> Result<(), PersistenceError> {
    match cmd {
        PersistenceCommand::RecordAnswer {
            user_id,
            certification_id,
            answer,
        } => gateway.record_answer(user_id, certification_id, answer),
        PersistenceCommand::RecordProgress {
            user_id,
            certification_id,
            question_id,
            is_correct,
        } => gateway.record_progress(user_id, certification_id, question_id, *is_correct),
        PersistenceCommand::SaveResult { user_id, result } => gateway.save_result(user_id, result),
        PersistenceCommand::SaveSession(session) => gateway.save_session(session),
    }
}

fn describe(cmd: &PersistenceCommand) -> String {
    match cmd {
        PersistenceCommand::RecordAnswer { answer, .. } => {
            format!("record answer for question {}", answer.question_id)
        }
        PersistenceCommand::RecordProgress { question_id, .. } => {
            format!("record progress for question {question_id}")
        }
        PersistenceCommand::SaveResult { result, .. } => format!("save result {}", result.id),
        PersistenceCommand::SaveSession(session) => {
            format!("save session {}", session.session_id)
        }
    }
}
