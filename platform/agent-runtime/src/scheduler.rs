//! Cron-scheduled triggers
//!
//! Accepts the common five-field form (`0 * * * *`) as well as the
//! seconds-first form the `cron` crate parses natively. Five-field
//! expressions use crontab day-of-week numbers (0-7, Sunday is 0 or 7);
//! six- and seven-field ones use the crate's (1-7, Sunday is 1).

use chrono::Utc;
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("invalid cron expression {expr:?}: {reason}")]
pub struct ScheduleError {
    pub expr: String,
    pub reason: String,
}

/// Parse a cron expression; five fields get a leading `0` seconds field
/// and crontab day-of-week numbering
pub fn parse_schedule(expr: &str) -> Result<Schedule, ScheduleError> {
    let invalid = |reason: String| ScheduleError {
        expr: expr.to_string(),
        reason,
    };

    let fields: Vec<&str> = expr.split_whitespace().collect();
    let normalized = if fields.len() == 5 {
        let day_of_week = crontab_day_of_week(fields[4]).map_err(invalid)?;
        format!("0 {} {} {} {} {day_of_week}", fields[0], fields[1], fields[2], fields[3])
    } else {
        fields.join(" ")
    };

    Schedule::from_str(&normalized).map_err(|e| invalid(e.to_string()))
}

/// Crontab weekday (0-7, 0 and 7 = Sunday) to the crate's (1-7, 1 = Sunday)
fn crontab_day(day: &str) -> Result<u8, String> {
    match day.parse::<u8>() {
        Ok(n @ 0..=7) => Ok(n % 7 + 1),
        Ok(n) => Err(format!("day-of-week {n} is out of range 0-7")),
        Err(_) => Err(format!("invalid day-of-week {day:?}")),
    }
}

/// Rewrite the numeric parts of a crontab day-of-week field; names and `*` pass through
fn crontab_day_of_week(field: &str) -> Result<String, String> {
    let mut items = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let numeric = |s: &str| s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty();

        let translated = match range.split_once('-') {
            Some((from, to)) if numeric(from) && numeric(to) => {
                let (start, end) = (crontab_day(from)?, to.parse::<u8>().unwrap_or(u8::MAX));
                match end {
                    7 if step.is_none() && from.parse::<u8>() == Ok(7) => "1".to_string(),
                    // ..Sunday wraps in the crate's numbering
                    7 if step.is_none() && start == 7 => "7,1".to_string(),
                    7 if step.is_none() && start > 1 => format!("{start}-7,1"),
                    7 if step.is_none() => "1-7".to_string(),
                    7 => return Err(format!("stepped range {item:?} ending on Sunday is unsupported")),
                    _ => format!("{start}-{}", crontab_day(to)?),
                }
            }
            None if numeric(range) => crontab_day(range)?.to_string(),
            _ => range.to_string(),
        };

        items.push(match step {
            Some(step) => format!("{translated}/{step}"),
            None => translated,
        });
    }
    Ok(items.join(","))
}

/// Run `job` on every tick of `schedule` until the task is aborted
///
/// A failing run is logged and the next tick still fires.
pub fn spawn_trigger<F, Fut, E>(
    name: &'static str,
    schedule: Schedule,
    job: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::fmt::Display + Send,
{
    tokio::spawn(async move {
        tracing::info!(trigger = name, "Scheduled trigger started");

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                tracing::warn!(trigger = name, "Schedule has no upcoming runs, trigger stopped");
                return;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            tracing::info!(trigger = name, scheduled_for = %next, "Scheduled trigger fired");
            if let Err(e) = job().await {
                tracing::error!(trigger = name, error = %e, "Scheduled run failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_five_field_hourly() {
        let schedule = parse_schedule("0 * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.minute(), 0);
        assert_eq!(next.second(), 0);
        assert!(next > Utc::now());
    }

    #[test]
    fn test_six_field_passes_through() {
        let schedule = parse_schedule("30 15 * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert_eq!(next.minute(), 15);
        assert_eq!(next.second(), 30);
    }

    #[test]
    fn test_five_field_weekdays_use_crontab_numbering() {
        use chrono::{Datelike, Weekday};

        let schedule = parse_schedule("0 9 * * 1-5").unwrap();
        let days: Vec<Weekday> = schedule.upcoming(Utc).take(10).map(|t| t.weekday()).collect();
        assert!(days.iter().all(|d| !matches!(d, Weekday::Sat | Weekday::Sun)));
        assert!(days.contains(&Weekday::Mon));
        assert!(days.contains(&Weekday::Fri));

        let sunday = parse_schedule("0 0 * * 0").unwrap();
        assert!(sunday.upcoming(Utc).take(3).all(|t| t.weekday() == Weekday::Sun));
        let also_sunday = parse_schedule("0 0 * * 7").unwrap();
        assert!(also_sunday.upcoming(Utc).take(3).all(|t| t.weekday() == Weekday::Sun));
    }

    #[test]
    fn test_crontab_day_of_week_translation() {
        assert_eq!(crontab_day_of_week("*").unwrap(), "*");
        assert_eq!(crontab_day_of_week("1-5").unwrap(), "2-6");
        assert_eq!(crontab_day_of_week("0,6").unwrap(), "1,7");
        assert_eq!(crontab_day_of_week("5-7").unwrap(), "6-7,1");
        assert_eq!(crontab_day_of_week("0-7").unwrap(), "1-7");
        assert_eq!(crontab_day_of_week("7-7").unwrap(), "1");
        assert_eq!(crontab_day_of_week("6-7").unwrap(), "7,1");
        assert_eq!(crontab_day_of_week("*/2").unwrap(), "*/2");
        assert_eq!(crontab_day_of_week("MON-FRI").unwrap(), "MON-FRI");
        assert!(crontab_day_of_week("8").is_err());
    }

    #[test]
    fn test_invalid_expression() {
        let err = parse_schedule("every hour").unwrap_err();
        assert_eq!(err.expr, "every hour");
        assert!(parse_schedule("").is_err());
    }

    #[tokio::test]
    async fn test_trigger_keeps_running_after_failure() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let handle = spawn_trigger("test", parse_schedule("* * * * * *").unwrap(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("boom")
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.abort();
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }
}
