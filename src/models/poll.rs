use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{choice, poll, question};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPoll {
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PollPatch {
    pub title: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestion {
    pub question_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChoice {
    pub choice_text: String,
    #[serde(default)]
    pub votes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChoicePatch {
    pub choice_text: Option<String>,
    pub votes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollView {
    pub id: i32,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl From<&poll::Model> for PollView {
    fn from(model: &poll::Model) -> Self {
        Self {
            id: model.id,
            title: model.title.clone(),
            start_date: model.start_date.with_timezone(&Utc),
            end_date: model.end_date.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: i32,
    pub poll_id: i32,
    pub question_text: String,
}

impl From<&question::Model> for QuestionView {
    fn from(model: &question::Model) -> Self {
        Self {
            id: model.id,
            poll_id: model.poll_id,
            question_text: model.question_text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceView {
    pub id: i32,
    pub question_id: i32,
    pub choice_text: String,
    pub votes: i32,
}

impl From<&choice::Model> for ChoiceView {
    fn from(model: &choice::Model) -> Self {
        Self {
            id: model.id,
            question_id: model.question_id,
            choice_text: model.choice_text.clone(),
            votes: model.votes,
        }
    }
}

/// A poll with its full question/choice tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDetailView {
    #[serde(flatten)]
    pub poll: PollView,
    pub questions: Vec<QuestionDetailView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDetailView {
    pub id: i32,
    pub question_text: String,
    pub choices: Vec<ChoiceView>,
}

impl PollDetailView {
    /// Groups `choices` under their questions. Both slices are expected in
    /// display order; choices whose question is not listed are dropped.
    pub fn assemble(
        poll: &poll::Model,
        questions: &[question::Model],
        choices: &[choice::Model],
    ) -> Self {
        let questions = questions
            .iter()
            .map(|question| QuestionDetailView {
                id: question.id,
                question_text: question.question_text.clone(),
                choices: choices
                    .iter()
                    .filter(|choice| choice.question_id == question.id)
                    .map(ChoiceView::from)
                    .collect(),
            })
            .collect();
        Self {
            poll: PollView::from(poll),
            questions,
        }
    }

    pub fn choice_count(&self) -> usize {
        self.questions.iter().map(|q| q.choices.len()).sum()
    }
}

/// Rows removed by a cascading delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSummary {
    pub polls: u64,
    pub questions: u64,
    pub choices: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_groups_choices_by_question() {
        let now = Utc::now().fixed_offset();
        let poll = poll::Model {
            id: 3,
            title: "Board".to_string(),
            start_date: now,
            end_date: now,
        };
        let questions = vec![
            question::Model {
                id: 10,
                poll_id: 3,
                question_text: "Chair?".to_string(),
            },
            question::Model {
                id: 11,
                poll_id: 3,
                question_text: "Treasurer?".to_string(),
            },
        ];
        let choices = vec![
            choice::Model {
                id: 1,
                question_id: 10,
                choice_text: "Ann".to_string(),
                votes: 4,
            },
            choice::Model {
                id: 2,
                question_id: 11,
                choice_text: "Bob".to_string(),
                votes: 0,
            },
            choice::Model {
                id: 3,
                question_id: 10,
                choice_text: "Cy".to_string(),
                votes: 1,
            },
        ];

        let detail = PollDetailView::assemble(&poll, &questions, &choices);
        assert_eq!(detail.poll.id, 3);
        assert_eq!(detail.questions.len(), 2);
        let chair: Vec<_> = detail.questions[0]
            .choices
            .iter()
            .map(|c| c.choice_text.as_str())
            .collect();
        assert_eq!(chair, vec!["Ann", "Cy"]);
        assert_eq!(detail.questions[1].choices.len(), 1);
        assert_eq!(detail.choice_count(), 3);
    }

    #[test]
    fn new_choice_votes_are_optional() {
        let parsed: NewChoice = serde_json::from_str(r#"{"choice_text":"A"}"#).unwrap();
        assert_eq!(parsed.votes, None);
    }
}
