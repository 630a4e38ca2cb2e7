//! Review-due status for policy documents.
//!
//! A document's review-due date is free text typed by an operator. At
//! query time it is classified against today's date:
//!
//! | Input | Status |
//! |-------|--------|
//! | empty or whitespace | [`ReviewStatus::NotSet`] |
//! | parses, before today | [`ReviewStatus::Overdue`] |
//! | parses, today or later | [`ReviewStatus::Ok`] |
//! | does not parse | [`ReviewStatus::InvalidFormat`] |
//!
//! The expected date format is a parameter, not a constant. The CLI and the
//! HTTP service have historically read the same column with different
//! formats ([`LONG_FORMAT`] and [`ISO_FORMAT`]); each call site passes its
//! own from [`ReviewConfig`](crate::config::ReviewConfig).

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric year-month-day, e.g. `2024-02-01`.
pub const ISO_FORMAT: &str = "%Y-%m-%d";
/// Long form, e.g. `February 1, 2024`.
pub const LONG_FORMAT: &str = "%B %d, %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Ok,
    Overdue,
    InvalidFormat,
    NotSet,
}

/// A classified due date, keeping the original text for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNote {
    pub status: ReviewStatus,
    pub due: String,
}

impl fmt::Display for ReviewNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ReviewStatus::Ok => write!(f, "{}", self.due),
            ReviewStatus::Overdue => write!(f, "{} (OVERDUE)", self.due),
            ReviewStatus::InvalidFormat => write!(f, "Invalid format ({})", self.due),
            ReviewStatus::NotSet => write!(f, "Not Set"),
        }
    }
}

/// Classify `due` relative to `today`, parsing with `format`.
///
/// Never fails: unparseable input is reported as
/// [`ReviewStatus::InvalidFormat`].
pub fn evaluate_review(due: &str, today: NaiveDate, format: &str) -> ReviewNote {
    let due = due.trim();
    let status = if due.is_empty() {
        ReviewStatus::NotSet
    } else {
        match NaiveDate::parse_from_str(due, format) {
            Ok(date) if date < today => ReviewStatus::Overdue,
            Ok(_) => ReviewStatus::Ok,
            Err(_) => ReviewStatus::InvalidFormat,
        }
    };
    ReviewNote {
        status,
        due: due.to_string(),
    }
}

/// [`evaluate_review`] against the local calendar date.
pub fn evaluate_review_today(due: &str, format: &str) -> ReviewNote {
    evaluate_review(due, Local::now().date_naive(), format)
}
