use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Days, Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::ClientError,
    session::{Session, expect_json},
};

/// One row per (user, calendar day) in the activity log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressLog {
    pub id: i64,
    pub user_id: String,
    pub date: NaiveDate,
    pub minutes: i32,
    pub notes_created: i32,
    pub quizzes_done: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressRange {
    Week,
    Month,
    Year,
}

impl ProgressRange {
    pub const fn days(self) -> u32 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }
}

/// One bar of the weekly chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub label: &'static str,
    pub minutes: i32,
}

/// Derived view over the raw log; recomputed on every fetch, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub total_minutes: i64,
    pub streak: u32,
    pub sessions_per_day: f64,
    /// Exactly the trailing 7 calendar days, oldest first, zero-filled.
    pub weekly: Vec<DayActivity>,
    pub today_minutes: i32,
    pub today_notes_created: i32,
}

const DAY_LABELS: [&str; 7] = ["Søn", "Man", "Tir", "Ons", "Tor", "Fre", "Lør"];

/// Pure aggregation over log rows for a trailing window. `today` is passed
/// in so the walk is deterministic regardless of wall clock.
pub fn summarize(logs: &[ProgressLog], today: NaiveDate) -> ProgressSummary {
    let mut minutes_by_date: HashMap<NaiveDate, i32> = HashMap::new();
    for log in logs {
        *minutes_by_date.entry(log.date).or_insert(0) += log.minutes;
    }

    let total_minutes = logs.iter().map(|log| i64::from(log.minutes)).sum();

    // A streak survives a day with no activity yet today, but only extends
    // on days that actually have logged minutes.
    let active_dates: HashSet<NaiveDate> = logs
        .iter()
        .filter(|log| log.minutes > 0)
        .map(|log| log.date)
        .collect();

    let mut cursor = today;
    if !active_dates.contains(&cursor) {
        cursor = cursor - Days::new(1);
    }

    let mut streak = 0u32;
    while active_dates.contains(&cursor) {
        streak += 1;
        cursor = cursor - Days::new(1);
    }

    let weekly = (0..7)
        .rev()
        .map(|offset| {
            let date = today - Days::new(offset);
            DayActivity {
                date,
                label: DAY_LABELS[date.weekday().num_days_from_sunday() as usize],
                minutes: minutes_by_date.get(&date).copied().unwrap_or(0),
            }
        })
        .collect();

    let distinct_days: HashSet<NaiveDate> = logs.iter().map(|log| log.date).collect();
    let sessions_per_day = if distinct_days.is_empty() {
        0.0
    } else {
        logs.len() as f64 / distinct_days.len() as f64
    };

    let today_log = logs.iter().find(|log| log.date == today);

    ProgressSummary {
        total_minutes,
        streak,
        sessions_per_day,
        weekly,
        today_minutes: today_log.map_or(0, |log| log.minutes),
        today_notes_created: today_log.map_or(0, |log| log.notes_created),
    }
}

pub struct ProgressClient {
    session: Session,
}

impl ProgressClient {
    pub const fn new(session: Session) -> Self {
        Self { session }
    }

    /// Raw log rows for the trailing window, oldest first.
    pub async fn fetch(&self, range: ProgressRange) -> Result<Vec<ProgressLog>, ClientError> {
        let response = self
            .session
            .http()
            .get(self.session.url("/rest/progress"))
            .query(&[
                ("user_id", self.session.user_id().to_string()),
                ("days", range.days().to_string()),
            ])
            .send()
            .await?;
        expect_json(response, "progress").await
    }

    pub async fn summary(&self, range: ProgressRange) -> Result<ProgressSummary, ClientError> {
        let logs = self.fetch(range).await?;
        Ok(summarize(&logs, Local::now().date_naive()))
    }

    pub async fn log_minutes(&self, minutes: i32) -> Result<ProgressLog, ClientError> {
        let response = self
            .session
            .http()
            .post(self.session.url("/rest/progress/minutes"))
            .json(&json!({
                "user_id": self.session.user_id(),
                "minutes": minutes,
            }))
            .send()
            .await?;
        expect_json(response, "progress").await
    }

    pub async fn log_quiz_done(&self) -> Result<ProgressLog, ClientError> {
        let response = self
            .session
            .http()
            .post(self.session.url("/rest/progress/quizzes-done"))
            .json(&json!({ "user_id": self.session.user_id() }))
            .send()
            .await?;
        expect_json(response, "progress").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().expect("valid date")
    }

    fn log(day: &str, minutes: i32) -> ProgressLog {
        ProgressLog {
            id: 0,
            user_id: "u1".to_string(),
            date: date(day),
            minutes,
            notes_created: 0,
            quizzes_done: 0,
        }
    }

    #[test]
    fn streak_counts_consecutive_days_up_to_the_first_gap() {
        let today = date("2026-08-05");
        let logs = vec![
            log("2026-08-05", 25),
            log("2026-08-04", 10),
            log("2026-08-03", 45),
            // gap at 2026-08-02
            log("2026-08-01", 30),
        ];

        assert_eq!(summarize(&logs, today).streak, 3);
    }

    #[test]
    fn streak_without_todays_log_starts_from_yesterday() {
        let today = date("2026-08-05");
        let logs = vec![log("2026-08-04", 10), log("2026-08-03", 45)];

        assert_eq!(summarize(&logs, today).streak, 2);
    }

    #[test]
    fn zero_minute_rows_do_not_extend_a_streak() {
        let today = date("2026-08-05");
        let logs = vec![log("2026-08-05", 0), log("2026-08-04", 10)];

        // Today has a row but no studied minutes, so the walk starts
        // from yesterday.
        assert_eq!(summarize(&logs, today).streak, 1);
    }

    #[test]
    fn weekly_series_is_seven_chronological_zero_filled_days() {
        let today = date("2026-08-05");
        let logs = vec![log("2026-08-05", 25), log("2026-08-01", 30)];

        let summary = summarize(&logs, today);
        assert_eq!(summary.weekly.len(), 7);
        assert_eq!(summary.weekly[0].date, date("2026-07-30"));
        assert_eq!(summary.weekly[6].date, today);
        for pair in summary.weekly.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }

        let minutes: Vec<i32> = summary.weekly.iter().map(|day| day.minutes).collect();
        assert_eq!(minutes, vec![0, 0, 30, 0, 0, 0, 25]);
    }

    #[test]
    fn weekly_labels_follow_the_day_of_week() {
        // 2026-08-05 is a Wednesday
        let summary = summarize(&[], date("2026-08-05"));
        assert_eq!(summary.weekly[6].label, "Ons");
        assert_eq!(summary.weekly[0].label, "Tor");
    }

    #[test]
    fn totals_and_sessions_per_day() {
        let today = date("2026-08-05");
        let logs = vec![
            log("2026-08-05", 25),
            log("2026-08-04", 10),
            log("2026-08-01", 5),
        ];

        let summary = summarize(&logs, today);
        assert_eq!(summary.total_minutes, 40);
        assert!((summary.sessions_per_day - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.today_minutes, 25);
    }

    #[test]
    fn empty_log_yields_a_zeroed_summary() {
        let summary = summarize(&[], date("2026-08-05"));
        assert_eq!(summary.total_minutes, 0);
        assert_eq!(summary.streak, 0);
        assert_eq!(summary.weekly.len(), 7);
        assert!(summary.sessions_per_day.abs() < f64::EPSILON);
    }
}
