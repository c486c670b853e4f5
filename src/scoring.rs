//! Pure views derived from a [`SessionState`] snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::question_bank::Question;
use crate::session::SessionState;
use crate::util::percentage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub correct_count: usize,
    pub total_answered: usize,
}

impl CategoryScore {
    /// 0 when nothing in the category was answered
    pub fn percent(&self) -> f64 {
        percentage(self.correct_count, self.total_answered)
    }
}

/// An answered question whose selection was wrong
#[derive(Debug, Clone, PartialEq)]
pub struct IncorrectQuestion {
    pub question: Question,
    pub selected_option_index: usize,
}

impl IncorrectQuestion {
    pub fn selected_option(&self) -> &str {
        &self.question.options[self.selected_option_index]
    }
}

/// Categories at or above the pass threshold vs. below it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Performance {
    pub strong: Vec<String>,
    pub weak: Vec<String>,
}

/// Percentage of answered questions that were correct, 0 when none were answered
pub fn overall_score(state: &SessionState) -> f64 {
    let (correct, answered) = state
        .entries()
        .filter_map(|(_, a)| a)
        .fold((0, 0), |(correct, answered), a| {
            (correct + usize::from(a.is_correct), answered + 1)
        });

    percentage(correct, answered)
}

/// Score per category. Every listed category is present, `{0,0}` when unanswered.
pub fn category_scores(
    state: &SessionState,
    categories: &[String],
) -> BTreeMap<String, CategoryScore> {
    let mut scores: BTreeMap<String, CategoryScore> = categories
        .iter()
        .map(|c| (c.clone(), CategoryScore::default()))
        .collect();

    for (question, answer) in state.entries() {
        if let Some(answer) = answer {
            let score = scores.entry(question.category.clone()).or_default();
            score.total_answered += 1;
            if answer.is_correct {
                score.correct_count += 1;
            }
        }
    }

    scores
}

/// Wrongly answered questions in presentation order
pub fn incorrect_questions(state: &SessionState) -> Vec<IncorrectQuestion> {
    state
        .entries()
        .filter_map(|(question, answer)| match answer {
            Some(a) if !a.is_correct => Some(IncorrectQuestion {
                question: question.clone(),
                selected_option_index: a.selected_option_index,
            }),
            _ => None,
        })
        .collect()
}

pub fn analyze_performance(
    scores: &BTreeMap<String, CategoryScore>,
    pass_threshold: f64,
) -> Performance {
    let mut performance = Performance::default();

    for (category, score) in scores.iter().filter(|(_, s)| s.total_answered > 0) {
        if score.percent() >= pass_threshold {
            performance.strong.push(category.clone());
        } else {
            performance.weak.push(category.clone());
        }
    }

    performance
}
