use std::fmt;

use chrono::{DateTime, Utc};

use crate::entities::{choice, poll, question};
use crate::store::StoreError;

pub const MAX_TEXT_LEN: usize = 200;

impl poll::Model {
    /// True while `at` falls inside `[start_date, end_date)`. An inverted
    /// window is never open.
    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let start = self.start_date.with_timezone(&Utc);
        let end = self.end_date.with_timezone(&Utc);
        start <= at && at < end
    }
}

impl fmt::Display for poll::Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl fmt::Display for question::Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.question_text)
    }
}

impl fmt::Display for choice::Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.choice_text)
    }
}

/// Titles, question and choice texts share the same rule: required, at most
/// `MAX_TEXT_LEN` characters after trimming.
pub fn canonicalize_text(field: &'static str, value: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(field, "must not be blank"));
    }
    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(StoreError::validation(
            field,
            format!("exceeds {MAX_TEXT_LEN} character limit"),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_votes(votes: i32) -> Result<i32, StoreError> {
    if votes < 0 {
        return Err(StoreError::validation(
            "votes",
            format!("must be non-negative, got {votes}"),
        ));
    }
    Ok(votes)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn poll_between(start: DateTime<Utc>, end: DateTime<Utc>) -> poll::Model {
        poll::Model {
            id: 1,
            title: "Election 2024".to_string(),
            start_date: start.fixed_offset(),
            end_date: end.fixed_offset(),
        }
    }

    #[test]
    fn text_validation() {
        assert_eq!(canonicalize_text("title", "  Budget vote ").unwrap(), "Budget vote");
        assert!(canonicalize_text("title", "   ").is_err());
        assert!(canonicalize_text("title", &"t".repeat(MAX_TEXT_LEN)).is_ok());
        assert!(canonicalize_text("title", &"t".repeat(MAX_TEXT_LEN + 1)).is_err());
        // Limit counts characters, not bytes.
        assert!(canonicalize_text("choice_text", &"é".repeat(MAX_TEXT_LEN)).is_ok());
    }

    #[test]
    fn votes_must_be_non_negative() {
        assert_eq!(validate_votes(0).unwrap(), 0);
        assert_eq!(validate_votes(12).unwrap(), 12);
        assert!(validate_votes(-1).is_err());
    }

    #[test]
    fn open_window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 11, 5, 8, 0, 0).unwrap();
        let end = start + Duration::hours(12);
        let poll = poll_between(start, end);

        assert!(!poll.is_open_at(start - Duration::seconds(1)));
        assert!(poll.is_open_at(start));
        assert!(poll.is_open_at(end - Duration::seconds(1)));
        assert!(!poll.is_open_at(end));

        let inverted = poll_between(end, start);
        assert!(!inverted.is_open_at(start + Duration::hours(1)));
    }

    #[test]
    fn display_strings() {
        let now = Utc::now();
        assert_eq!(poll_between(now, now).to_string(), "Election 2024");
        let question = question::Model {
            id: 1,
            poll_id: 1,
            question_text: "Who should win?".to_string(),
        };
        assert_eq!(question.to_string(), "Who should win?");
        let choice = choice::Model {
            id: 1,
            question_id: 1,
            choice_text: "A".to_string(),
            votes: 0,
        };
        assert_eq!(choice.to_string(), "A");
    }
}
