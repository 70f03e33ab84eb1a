//! Quizzes backing `quiz`-type onboarding tasks.
//!
//! Grading is `round(100 * correct / total)`; a score of [`PASS_SCORE`] or
//! more completes the linked task.

pub mod handlers;

use serde::Serialize;

use crate::errors::AppError;

pub const PASS_SCORE: u32 = 80;

#[derive(Debug, Clone)]
pub struct Question {
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    pub correct: usize,
}

#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: &'static str,
    pub task_id: &'static str,
    pub title: &'static str,
    pub questions: &'static [Question],
}

const POLICIES_QUESTIONS: &[Question] = &[
    Question {
        prompt: "Who should you contact first about a suspected data breach?",
        options: &["Your team chat", "The security team", "A customer", "Nobody"],
        correct: 1,
    },
    Question {
        prompt: "May confidential documents be stored on a personal device?",
        options: &["Yes, always", "Only if encrypted and approved", "Never"],
        correct: 2,
    },
    Question {
        prompt: "How many days in advance should planned leave be requested?",
        options: &["1", "5", "10", "No notice needed"],
        correct: 2,
    },
    Question {
        prompt: "Where are workplace conduct concerns reported?",
        options: &["HR or the anonymous hotline", "Social media", "Nowhere"],
        correct: 0,
    },
    Question {
        prompt: "What must you do before sharing your screen in a client call?",
        options: &[
            "Close unrelated confidential windows",
            "Nothing",
            "Ask IT for permission",
        ],
        correct: 0,
    },
];

const QUIZZES: &[Quiz] = &[Quiz {
    id: "company-policies",
    task_id: "policies-quiz",
    title: "Company policies",
    questions: POLICIES_QUESTIONS,
}];

pub fn find_quiz(quiz_id: &str) -> Option<&'static Quiz> {
    QUIZZES.iter().find(|q| q.id == quiz_id)
}

/// Question without its answer, as sent to clients.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub index: usize,
    pub prompt: &'static str,
    pub options: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct PublicQuiz {
    pub id: &'static str,
    pub task_id: &'static str,
    pub title: &'static str,
    pub pass_score: u32,
    pub questions: Vec<PublicQuestion>,
}

impl Quiz {
    pub fn public_view(&self) -> PublicQuiz {
        PublicQuiz {
            id: self.id,
            task_id: self.task_id,
            title: self.title,
            pass_score: PASS_SCORE,
            questions: self
                .questions
                .iter()
                .enumerate()
                .map(|(index, q)| PublicQuestion {
                    index,
                    prompt: q.prompt,
                    options: q.options,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuizResult {
    pub correct: usize,
    pub total: usize,
    pub score: u32,
    pub passed: bool,
}

/// One answer (option index) per question, in order.
pub fn grade(quiz: &Quiz, answers: &[usize]) -> Result<QuizResult, AppError> {
    let total = quiz.questions.len();
    if answers.len() != total {
        return Err(AppError::Validation(format!(
            "Expected {total} answers, got {}",
            answers.len()
        )));
    }
    if let Some((i, _)) = quiz
        .questions
        .iter()
        .zip(answers)
        .enumerate()
        .find(|(_, (q, a))| **a >= q.options.len())
    {
        return Err(AppError::Validation(format!(
            "Answer for question {i} is out of range"
        )));
    }

    let correct = quiz
        .questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| q.correct == **a)
        .count();
    let score = if total == 0 {
        0
    } else {
        (100.0 * correct as f64 / total as f64).round() as u32
    };
    Ok(QuizResult {
        correct,
        total,
        score,
        passed: score >= PASS_SCORE,
    })
}
