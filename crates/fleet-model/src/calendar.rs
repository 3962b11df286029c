//! Recurring active-time calendars

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Weekly recurring window
///
/// `end` before `start` wraps past midnight into the following day;
/// `start == end` covers the whole day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl Recurrence {
    fn applies_on(&self, date: NaiveDate) -> bool {
        self.days.contains(&date.weekday())
            && self.valid_from.map_or(true, |from| date >= from)
            && self.valid_until.map_or(true, |until| date <= until)
    }

    fn contains(&self, local: NaiveDateTime) -> bool {
        let date = local.date();
        let time = local.time();

        if self.start == self.end {
            return self.applies_on(date);
        }
        if self.start < self.end {
            return self.applies_on(date) && time >= self.start && time < self.end;
        }

        // Overnight window: evening part today, morning part from yesterday
        (self.applies_on(date) && time >= self.start)
            || (time < self.end && date.pred_opt().is_some_and(|prev| self.applies_on(prev)))
    }
}

/// Recurring schedule gating when an event may fire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: i64,
    pub name: String,
    /// Local time offset the windows are expressed in
    #[serde(default)]
    pub utc_offset_minutes: i32,
    pub windows: Vec<Recurrence>,
}

impl Calendar {
    /// Create a validated calendar
    pub fn new(
        id: i64,
        name: impl Into<String>,
        utc_offset_minutes: i32,
        windows: Vec<Recurrence>,
    ) -> Result<Self, ModelError> {
        let calendar = Self {
            id,
            name: name.into(),
            utc_offset_minutes,
            windows,
        };
        calendar.validate()?;
        Ok(calendar)
    }

    fn offset(&self) -> Option<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
    }

    /// Check invariants of a deserialized calendar
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.offset().is_none() {
            return Err(ModelError::InvalidOffset(self.utc_offset_minutes));
        }
        if self.windows.iter().any(|w| w.days.is_empty()) {
            return Err(ModelError::EmptyRecurrence(self.id));
        }
        Ok(())
    }

    /// Whether `moment` falls inside any recurring window
    pub fn check_moment(&self, moment: DateTime<Utc>) -> bool {
        let offset = self.offset().unwrap_or_else(|| Utc.fix());
        let local = moment.with_timezone(&offset).naive_local();
        self.windows.iter().any(|w| w.contains(local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn weekdays() -> Vec<Weekday> {
        vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
    }

    #[test]
    fn test_office_hours() {
        let calendar = Calendar::new(
            1,
            "office",
            0,
            vec![Recurrence {
                days: weekdays(),
                start: hm(8, 0),
                end: hm(18, 0),
                valid_from: None,
                valid_until: None,
            }],
        )
        .unwrap();

        // 2024-03-04 is a Monday
        assert!(calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()));
        assert!(!calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap()));
        assert!(!calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap()));
    }

    #[test]
    fn test_offset_shifts_window() {
        let calendar = Calendar::new(
            2,
            "east",
            120,
            vec![Recurrence {
                days: weekdays(),
                start: hm(8, 0),
                end: hm(9, 0),
                valid_from: None,
                valid_until: None,
            }],
        )
        .unwrap();

        // 06:30 UTC is 08:30 at +02:00
        assert!(calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 4, 6, 30, 0).unwrap()));
        assert!(!calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap()));
    }

    #[test]
    fn test_overnight_window() {
        let calendar = Calendar::new(
            3,
            "night",
            0,
            vec![Recurrence {
                days: vec![Weekday::Fri],
                start: hm(22, 0),
                end: hm(6, 0),
                valid_from: None,
                valid_until: None,
            }],
        )
        .unwrap();

        // Friday 2024-03-08 23:00 and Saturday 05:00 belong to Friday's window
        assert!(calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 8, 23, 0, 0).unwrap()));
        assert!(calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 9, 5, 0, 0).unwrap()));
        assert!(!calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 9, 23, 0, 0).unwrap()));
    }

    #[test]
    fn test_validity_range() {
        let calendar = Calendar::new(
            4,
            "season",
            0,
            vec![Recurrence {
                days: vec![Weekday::Mon],
                start: hm(0, 0),
                end: hm(0, 0),
                valid_from: NaiveDate::from_ymd_opt(2024, 3, 1),
                valid_until: NaiveDate::from_ymd_opt(2024, 3, 31),
            }],
        )
        .unwrap();

        assert!(calendar.check_moment(Utc.with_ymd_and_hms(2024, 3, 11, 12, 0, 0).unwrap()));
        assert!(!calendar.check_moment(Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_invalid_calendar_rejected() {
        assert!(Calendar::new(5, "bad", 24 * 60, vec![]).is_err());
        let empty_days = Recurrence {
            days: vec![],
            start: hm(0, 0),
            end: hm(1, 0),
            valid_from: None,
            valid_until: None,
        };
        assert!(Calendar::new(6, "bad", 0, vec![empty_days]).is_err());
    }

    #[test]
    fn test_overflowing_offset_rejected() {
        let json = format!(
            r#"{{"id":7,"name":"far","utcOffsetMinutes":{},"windows":[{{"days":["Mon"],"start":"00:00:00","end":"00:00:00"}}]}}"#,
            i32::MAX
        );
        let calendar: Calendar = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            calendar.validate(),
            Err(ModelError::InvalidOffset(i32::MAX))
        ));
        assert!(Calendar::new(8, "far", i32::MIN, vec![]).is_err());

        // Unvalidated calendars fall back to UTC instead of failing
        let monday = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        assert!(calendar.check_moment(monday));
    }
}
