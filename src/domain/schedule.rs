// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cron schedules for reports.
//!
//! Accepts the classic 5-field form (`min hour dom month dow`) as well as the
//! 6/7-field form with seconds and the `@daily`-style descriptors understood
//! by the `cron` crate. 5-field expressions get a zero seconds field and their
//! numeric day-of-week values (0 or 7 = Sunday) are rewritten to day names,
//! since the `cron` crate numbers days from 1 = Sunday.

use crate::domain::errors::{RelayError, Result};
use chrono::{DateTime, Local};
use cron::Schedule;
use std::fmt;
use std::str::FromStr;

const DAY_NAMES: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

#[derive(Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(RelayError::ConfigError(
                "cron schedule not provided".to_string(),
            ));
        }
        let normalized = normalize(trimmed);
        let schedule = Schedule::from_str(&normalized).map_err(|e| {
            RelayError::ConfigError(format!("invalid cron schedule '{}': {}", trimmed, e))
        })?;
        Ok(Self {
            expression: trimmed.to_string(),
            schedule,
        })
    }

    /// The expression as written in the configuration.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.after(after).next()
    }
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expression).finish()
    }
}

fn normalize(expression: &str) -> String {
    if expression.starts_with('@') {
        return expression.to_string();
    }
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }
    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        day_of_week_names(fields[4])
    )
}

fn day_of_week_names(field: &str) -> String {
    field
        .split(',')
        .map(day_of_week_item)
        .collect::<Vec<_>>()
        .join(",")
}

fn day_of_week_item(item: &str) -> String {
    let (range, step) = match item.split_once('/') {
        Some((r, s)) => (r, Some(s)),
        None => (item, None),
    };
    match (range.split_once('-'), step) {
        // Sunday is both 0 and 7, so a range ending in 7 wraps past SAT and
        // cannot be written as a single `cron` range.
        (Some((start, "7")), None) => format!("{}-SAT,SUN", day_name(start)),
        (Some((start, "7")), Some(step)) => match (start.parse::<usize>(), step.parse::<usize>()) {
            (Ok(first), Ok(every)) if every > 0 && first <= 7 => (first..=7)
                .step_by(every)
                .map(|n| DAY_NAMES[n])
                .collect::<Vec<_>>()
                .join(","),
            _ => item.to_string(),
        },
        (Some((start, end)), _) => with_step(format!("{}-{}", day_name(start), day_name(end)), step),
        (None, _) => with_step(day_name(range), step),
    }
}

fn with_step(mapped: String, step: Option<&str>) -> String {
    match step {
        Some(s) => format!("{}/{}", mapped, s),
        None => mapped,
    }
}

fn day_name(token: &str) -> String {
    match token.parse::<usize>() {
        Ok(n) if n < DAY_NAMES.len() => DAY_NAMES[n].to_string(),
        _ => token.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_five_field_expression_fires_on_the_minute() {
        let s = CronSchedule::parse("30 6 * * *").unwrap();
        let next = s.next_after(&at(2026, 3, 10, 5, 0)).unwrap();
        assert_eq!((next.hour(), next.minute(), next.second()), (6, 30, 0));
    }

    #[test]
    fn test_numeric_weekdays_use_standard_cron_numbering() {
        // 2026-03-10 is a Tuesday; "1" must mean Monday.
        let s = CronSchedule::parse("0 9 * * 1").unwrap();
        let next = s.next_after(&at(2026, 3, 10, 12, 0)).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);

        let sunday = CronSchedule::parse("0 9 * * 0").unwrap();
        assert_eq!(
            sunday.next_after(&at(2026, 3, 10, 12, 0)).unwrap().weekday(),
            Weekday::Sun
        );
    }

    #[test]
    fn test_weekday_range_to_seven_includes_sunday() {
        assert_eq!(day_of_week_names("5-7"), "FRI-SAT,SUN");
        assert_eq!(day_of_week_names("1-5"), "MON-FRI");
        assert_eq!(day_of_week_names("*"), "*");
        assert_eq!(day_of_week_names("MON,3"), "MON,WED");
    }

    #[test]
    fn test_stepped_weekday_range_to_seven_is_expanded() {
        assert_eq!(day_of_week_names("1-7/2"), "MON,WED,FRI,SUN");
        assert_eq!(day_of_week_names("2-7/3"), "TUE,FRI");
        assert_eq!(day_of_week_names("1-5/2"), "MON-FRI/2");

        // 2026-03-14 is a Saturday; the next match of 1-7/2 is Sunday.
        let s = CronSchedule::parse("0 9 * * 1-7/2").unwrap();
        let next = s.next_after(&at(2026, 3, 14, 12, 0)).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_six_field_and_descriptor_forms() {
        assert!(CronSchedule::parse("*/10 * * * * *").is_ok());
        assert!(CronSchedule::parse("@daily").is_ok());
    }

    #[test]
    fn test_invalid_and_empty_schedules_are_config_errors() {
        assert!(matches!(
            CronSchedule::parse("not a cron"),
            Err(RelayError::ConfigError(_))
        ));
        assert!(matches!(
            CronSchedule::parse("   "),
            Err(RelayError::ConfigError(_))
        ));
        assert!(matches!(
            CronSchedule::parse("61 * * * *"),
            Err(RelayError::ConfigError(_))
        ));
    }
}
