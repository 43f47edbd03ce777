use std::collections::BTreeMap;

use crate::models::{FeedbackEntry, ProjectScore, Rating, RatingCount};

/// Fixed score of a rating label; labels outside the rating set score 0.
pub fn rating_to_score(label: &str) -> u8 {
    Rating::from_label(label).map(Rating::score).unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Acceptable,
    Weak,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            ScoreBand::Strong
        } else if score >= 80.0 {
            ScoreBand::Acceptable
        } else {
            ScoreBand::Weak
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            ScoreBand::Strong => (0, 128, 0),
            ScoreBand::Acceptable => (144, 238, 144),
            ScoreBand::Weak => (255, 0, 0),
        }
    }
}

pub fn average_by_project(entries: &[FeedbackEntry]) -> Vec<ProjectScore> {
    average_by(entries, |entry| entry.project.clone())
}

/// Mean score per `"{project}-{audit_no}"` label
pub fn average_by_project_audit(entries: &[FeedbackEntry]) -> Vec<ProjectScore> {
    average_by(entries, |entry| format!("{}-{}", entry.project, entry.audit_no))
}

fn average_by<F>(entries: &[FeedbackEntry], key: F) -> Vec<ProjectScore>
where
    F: Fn(&FeedbackEntry) -> String,
{
    // Integer sums keep the mean independent of row order.
    let mut groups: BTreeMap<String, (u64, usize)> = BTreeMap::new();

    for entry in entries {
        let group = groups.entry(key(entry)).or_insert((0, 0));
        group.0 += u64::from(rating_to_score(&entry.rating));
        group.1 += 1;
    }

    groups
        .into_iter()
        .map(|(label, (total, count))| ProjectScore {
            label,
            score: total as f64 / count as f64,
            entry_count: count,
        })
        .collect()
}

/// Stable ascending sort by mean score; equal scores keep their prior order.
pub fn rank_ascending(scores: &mut [ProjectScore]) {
    scores.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
}

/// Number of entries per (project, rating label)
pub fn rating_counts(entries: &[FeedbackEntry]) -> Vec<RatingCount> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();

    for entry in entries {
        *counts
            .entry((entry.project.clone(), entry.rating.clone()))
            .or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((project, rating), count)| RatingCount {
            project,
            rating,
            count,
        })
        .collect()
}

/// The selected audit and the two audit numbers before it. Numbers below 1
/// do not exist and are dropped.
pub fn analysis_window(audit_no: i64) -> Vec<i64> {
    (0..3)
        .map(|offset| audit_no - offset)
        .filter(|n| *n >= 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(audit_no: i64, project: &str, subcategory: &str, rating: &str) -> FeedbackEntry {
        FeedbackEntry {
            audit_no,
            date: NaiveDate::from_ymd_opt(2026, 3, 14)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            project: project.to_string(),
            category: "1. General".to_string(),
            subcategory: subcategory.to_string(),
            rating: rating.to_string(),
            comment: String::new(),
        }
    }

    #[test]
    fn scores_follow_fixed_table() {
        assert_eq!(rating_to_score("Excellent"), 100);
        assert_eq!(rating_to_score("Good"), 80);
        assert_eq!(rating_to_score("Need Improvement"), 50);
        assert_eq!(rating_to_score("Work Not Started"), 0);
        assert_eq!(rating_to_score("Outstanding"), 0);
        assert_eq!(rating_to_score(""), 0);
    }

    #[test]
    fn bands_split_at_eighty_and_ninety() {
        assert_eq!(ScoreBand::from_score(100.0), ScoreBand::Strong);
        assert_eq!(ScoreBand::from_score(90.0), ScoreBand::Strong);
        assert_eq!(ScoreBand::from_score(89.99), ScoreBand::Acceptable);
        assert_eq!(ScoreBand::from_score(80.0), ScoreBand::Acceptable);
        assert_eq!(ScoreBand::from_score(79.5), ScoreBand::Weak);
        assert_eq!(ScoreBand::from_score(0.0), ScoreBand::Weak);
        assert_eq!(ScoreBand::Acceptable.rgb(), (144, 238, 144));
    }

    #[test]
    fn averages_group_by_project() {
        let entries = vec![
            entry(1, "Buxar-1", "1.01", "Excellent"),
            entry(1, "Buxar-1", "1.02", "Good"),
            entry(1, "Khurja-1", "1.01", "Need Improvement"),
            entry(1, "Khurja-1", "1.02", "Mystery"),
        ];

        let scores = average_by_project(&entries);
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].label, "Buxar-1");
        assert!((scores[0].score - 90.0).abs() < f64::EPSILON);
        assert_eq!(scores[0].entry_count, 2);
        assert_eq!(scores[1].label, "Khurja-1");
        assert!((scores[1].score - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn averages_ignore_row_order() {
        let mut entries = vec![
            entry(1, "Buxar-1", "1.01", "Excellent"),
            entry(1, "Khurja-2", "1.01", "Good"),
            entry(1, "Buxar-1", "1.02", "Need Improvement"),
            entry(1, "Khurja-2", "1.02", "Work Not Started"),
            entry(1, "Buxar-1", "1.03", "Good"),
        ];
        let forward = average_by_project(&entries);
        entries.reverse();
        let reversed = average_by_project(&entries);
        entries.rotate_left(2);
        let rotated = average_by_project(&entries);

        assert_eq!(forward, reversed);
        assert_eq!(forward, rotated);
    }

    #[test]
    fn project_audit_labels_split_audits() {
        let entries = vec![
            entry(1, "Buxar-1", "1.01", "Good"),
            entry(2, "Buxar-1", "1.01", "Excellent"),
            entry(2, "Buxar-1", "1.02", "Excellent"),
        ];
        let scores = average_by_project_audit(&entries);
        let labels: Vec<&str> = scores.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Buxar-1-1", "Buxar-1-2"]);
        assert!((scores[0].score - 80.0).abs() < f64::EPSILON);
        assert!((scores[1].score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ranking_is_ascending_and_stable() {
        let mut scores = vec![
            ProjectScore { label: "A".to_string(), score: 90.0, entry_count: 1 },
            ProjectScore { label: "B".to_string(), score: 50.0, entry_count: 1 },
            ProjectScore { label: "C".to_string(), score: 90.0, entry_count: 1 },
            ProjectScore { label: "D".to_string(), score: 65.0, entry_count: 1 },
        ];
        rank_ascending(&mut scores);
        let labels: Vec<&str> = scores.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn counts_ratings_per_project() {
        let entries = vec![
            entry(1, "Buxar-1", "1.01", "Good"),
            entry(2, "Buxar-1", "1.01", "Good"),
            entry(2, "Buxar-1", "1.02", "Excellent"),
            entry(2, "Khurja-1", "1.02", "Good"),
        ];
        let counts = rating_counts(&entries);
        assert_eq!(
            counts,
            vec![
                RatingCount { project: "Buxar-1".to_string(), rating: "Excellent".to_string(), count: 1 },
                RatingCount { project: "Buxar-1".to_string(), rating: "Good".to_string(), count: 2 },
                RatingCount { project: "Khurja-1".to_string(), rating: "Good".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn window_covers_two_preceding_audits() {
        assert_eq!(analysis_window(5), vec![5, 4, 3]);
        assert_eq!(analysis_window(2), vec![2, 1]);
        assert_eq!(analysis_window(1), vec![1]);
    }
}
