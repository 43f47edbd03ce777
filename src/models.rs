use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Storage and export format of `FeedbackEntry::date`
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rating {
    Excellent,
    Good,
    NeedImprovement,
    WorkNotStarted,
}

impl Rating {
    pub const ALL: [Rating; 4] = [
        Rating::Excellent,
        Rating::Good,
        Rating::NeedImprovement,
        Rating::WorkNotStarted,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::NeedImprovement => "Need Improvement",
            Rating::WorkNotStarted => "Work Not Started",
        }
    }

    pub fn from_label(label: &str) -> Option<Rating> {
        Rating::ALL
            .into_iter()
            .find(|rating| rating.label().eq_ignore_ascii_case(label.trim()))
    }

    pub fn score(self) -> u8 {
        match self {
            Rating::Excellent => 100,
            Rating::Good => 80,
            Rating::NeedImprovement => 50,
            Rating::WorkNotStarted => 0,
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rating::from_label(s).ok_or_else(|| {
            Error::InvalidInput(format!(
                "unknown rating '{s}' (expected one of: {})",
                Rating::ALL.map(Rating::label).join(", ")
            ))
        })
    }
}

/// One stored row of the `feedback` table.
///
/// `rating` stays a plain label: rows written by older tooling may carry
/// labels outside [`Rating`], and those still need to export and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub audit_no: i64,
    #[serde(with = "date_format")]
    pub date: NaiveDateTime,
    pub project: String,
    pub category: String,
    pub subcategory: String,
    pub rating: String,
    pub comment: String,
}

/// Ratings for the subcategories of one (audit, project, category).
#[derive(Debug, Clone, Default)]
pub struct FeedbackBatch {
    pub audit_no: i64,
    pub project: String,
    pub category: String,
    pub ratings: BTreeMap<String, Rating>,
    pub comments: BTreeMap<String, String>,
}

impl FeedbackBatch {
    pub fn comment_for(&self, subcategory: &str) -> &str {
        self.comments.get(subcategory).map(String::as_str).unwrap_or("")
    }
}

/// Mean score of one group (a project, or a project-audit label).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectScore {
    pub label: String,
    pub score: f64,
    pub entry_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingCount {
    pub project: String,
    pub rating: String,
    pub count: usize,
}

pub mod date_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::DATE_FORMAT;

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back_to_ratings() {
        for rating in Rating::ALL {
            assert_eq!(rating.label().parse::<Rating>().unwrap(), rating);
        }
        assert_eq!(Rating::from_label(" need improvement "), Some(Rating::NeedImprovement));
    }

    #[test]
    fn unknown_label_is_invalid_input() {
        let err = "Average".parse::<Rating>().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn missing_comment_reads_as_empty() {
        let mut batch = FeedbackBatch::default();
        batch.comments.insert("1.01 Organization chart".to_string(), "ok".to_string());
        assert_eq!(batch.comment_for("1.01 Organization chart"), "ok");
        assert_eq!(batch.comment_for("1.03 Drawing control"), "");
    }
}
