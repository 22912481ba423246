#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident record types shared by the cleaning stage, the trailing-window
//! feature engine and the CSV writers.
//!
//! An [`IncidentRecord`] is produced once by cleaning, gets its
//! [`WindowCounts`] filled in once by the feature engine, and is never
//! modified afterwards.

use chrono::{DateTime, Datelike as _, Utc, Weekday};
use crime_features_crime_models::CrimeGroup;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Trailing-window counts derived for a single incident.
///
/// Every count excludes the incident itself and only covers incidents that
/// happened strictly before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowCounts {
    /// Incidents at the same location in the short (7 day) window.
    pub count_7d_location: u64,
    /// Incidents at the same location in the long (30 day) window.
    pub count_30d_location: u64,
    /// Incidents at the same hour of day in the 30 day window. Zero for
    /// incidents without a recorded hour.
    pub count_30d_hour: u64,
}

/// A cleaned crime incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentRecord {
    /// Source incident identifier. Several offenses of one incident share it.
    pub incident_id: String,
    /// When the incident occurred. `None` only when the record was read from
    /// a file with a missing or unparseable date; such records are rejected
    /// by the event store.
    pub event_time: Option<DateTime<Utc>>,
    /// NIBRS location identifier.
    pub location_id: String,
    /// Hour of day, 0-23. NIBRS leaves it blank for many incidents; those
    /// still count toward location windows but never match an hour.
    pub hour_of_day: Option<u8>,
    /// Coarse crime group (the classification label).
    pub crime_group: CrimeGroup,
    /// Derived trailing-window counts. All zero until computed.
    #[serde(default)]
    pub counts: WindowCounts,
}

impl IncidentRecord {
    /// Creates a record with a known event time and zeroed counts. The hour
    /// may be given as a plain `u8` or as `None` when unknown.
    #[must_use]
    pub fn new(
        incident_id: impl Into<String>,
        event_time: DateTime<Utc>,
        location_id: impl Into<String>,
        hour_of_day: impl Into<Option<u8>>,
        crime_group: CrimeGroup,
    ) -> Self {
        Self {
            incident_id: incident_id.into(),
            event_time: Some(event_time),
            location_id: location_id.into(),
            hour_of_day: hour_of_day.into(),
            crime_group,
            counts: WindowCounts::default(),
        }
    }

    /// Returns this record with the given counts attached.
    #[must_use]
    pub fn with_counts(self, counts: WindowCounts) -> Self {
        Self { counts, ..self }
    }
}

/// Meteorological season, keyed off the month.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum Season {
    /// December, January, February
    Winter,
    /// March, April, May
    Spring,
    /// June, July, August
    Summer,
    /// September, October, November
    Fall,
}

impl Season {
    /// Returns the season for a 1-based month, or `None` if `month` is not
    /// in 1-12.
    #[must_use]
    pub const fn from_month(month: u32) -> Option<Self> {
        if month < 1 || month > 12 {
            return None;
        }
        match month % 12 / 3 {
            0 => Some(Self::Winter),
            1 => Some(Self::Spring),
            2 => Some(Self::Summer),
            _ => Some(Self::Fall),
        }
    }
}

/// Six-hour bucket of the day.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum HourGroup {
    /// 00:00-05:59
    #[serde(rename = "Early Morning")]
    #[strum(serialize = "Early Morning")]
    EarlyMorning,
    /// 06:00-11:59
    Morning,
    /// 12:00-17:59
    Afternoon,
    /// 18:00-23:59
    Evening,
}

impl HourGroup {
    /// Returns the bucket for an hour of day, or `None` for hours past 23.
    #[must_use]
    pub const fn from_hour(hour: u8) -> Option<Self> {
        match hour {
            0..=5 => Some(Self::EarlyMorning),
            6..=11 => Some(Self::Morning),
            12..=17 => Some(Self::Afternoon),
            18..=23 => Some(Self::Evening),
            _ => None,
        }
    }
}

/// Calendar features derived from an incident's date and hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFeatures {
    /// Day of the week the incident occurred on.
    pub day_of_week: Weekday,
    /// Month, 1-12.
    pub month: u32,
    /// Season of the month.
    pub season: Season,
    /// Bucket of the hour of day, if the hour is known.
    pub hour_group: Option<HourGroup>,
    /// Saturday or Sunday.
    pub is_weekend: bool,
}

impl TimeFeatures {
    /// Derives calendar features for a record. Returns `None` when the
    /// record has no event time or an hour above 23.
    #[must_use]
    pub fn from_record(record: &IncidentRecord) -> Option<Self> {
        Self::derive(record.event_time?, record.hour_of_day)
    }

    /// Derives calendar features from a timestamp and an optional hour of
    /// day.
    #[must_use]
    pub fn derive(event_time: DateTime<Utc>, hour_of_day: Option<u8>) -> Option<Self> {
        let day_of_week = event_time.weekday();
        let month = event_time.month();
        let hour_group = match hour_of_day {
            Some(hour) => Some(HourGroup::from_hour(hour)?),
            None => None,
        };

        Some(Self {
            day_of_week,
            month,
            season: Season::from_month(month)?,
            hour_group,
            is_weekend: matches!(day_of_week, Weekday::Sat | Weekday::Sun),
        })
    }

    /// Full English weekday name (e.g. `"Monday"`).
    #[must_use]
    pub const fn day_name(&self) -> &'static str {
        match self.day_of_week {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn seasons_follow_month_buckets() {
        assert_eq!(Season::from_month(12), Some(Season::Winter));
        assert_eq!(Season::from_month(1), Some(Season::Winter));
        assert_eq!(Season::from_month(2), Some(Season::Winter));
        assert_eq!(Season::from_month(3), Some(Season::Spring));
        assert_eq!(Season::from_month(6), Some(Season::Summer));
        assert_eq!(Season::from_month(8), Some(Season::Summer));
        assert_eq!(Season::from_month(9), Some(Season::Fall));
        assert_eq!(Season::from_month(11), Some(Season::Fall));
        assert_eq!(Season::from_month(0), None);
        assert_eq!(Season::from_month(13), None);
    }

    #[test]
    fn hour_groups_are_half_open() {
        assert_eq!(HourGroup::from_hour(0), Some(HourGroup::EarlyMorning));
        assert_eq!(HourGroup::from_hour(5), Some(HourGroup::EarlyMorning));
        assert_eq!(HourGroup::from_hour(6), Some(HourGroup::Morning));
        assert_eq!(HourGroup::from_hour(12), Some(HourGroup::Afternoon));
        assert_eq!(HourGroup::from_hour(18), Some(HourGroup::Evening));
        assert_eq!(HourGroup::from_hour(23), Some(HourGroup::Evening));
        assert_eq!(HourGroup::from_hour(24), None);
        assert_eq!(HourGroup::EarlyMorning.to_string(), "Early Morning");
    }

    #[test]
    fn derives_weekend_features() {
        // 2022-01-01 was a Saturday.
        let features = TimeFeatures::derive(at(2022, 1, 1), Some(21)).unwrap();
        assert_eq!(features.day_name(), "Saturday");
        assert_eq!(features.month, 1);
        assert_eq!(features.season, Season::Winter);
        assert_eq!(features.hour_group, Some(HourGroup::Evening));
        assert!(features.is_weekend);

        let features = TimeFeatures::derive(at(2022, 7, 4), Some(9)).unwrap();
        assert_eq!(features.day_name(), "Monday");
        assert_eq!(features.season, Season::Summer);
        assert!(!features.is_weekend);
    }

    #[test]
    fn unknown_hour_has_no_hour_group() {
        let features = TimeFeatures::derive(at(2022, 3, 15), None).unwrap();
        assert_eq!(features.hour_group, None);
        assert_eq!(features.season, Season::Spring);

        assert!(TimeFeatures::derive(at(2022, 3, 15), Some(24)).is_none());

        let record = IncidentRecord::new("9", at(2022, 3, 15), "L1", None::<u8>, CrimeGroup::Other);
        assert_eq!(record.hour_of_day, None);
        assert!(TimeFeatures::from_record(&record).is_some());
    }

    #[test]
    fn record_without_time_has_no_features() {
        let mut record = IncidentRecord::new("1", at(2022, 1, 1), "L1", 3, CrimeGroup::Other);
        assert!(TimeFeatures::from_record(&record).is_some());
        record.event_time = None;
        assert!(TimeFeatures::from_record(&record).is_none());
    }

    #[test]
    fn with_counts_replaces_counts_only() {
        let record = IncidentRecord::new("7", at(2021, 5, 1), "L2", 14, CrimeGroup::Violent);
        let counts = WindowCounts {
            count_7d_location: 1,
            count_30d_location: 4,
            count_30d_hour: 9,
        };
        let annotated = record.clone().with_counts(counts);
        assert_eq!(annotated.counts, counts);
        assert_eq!(annotated.incident_id, record.incident_id);
        assert_eq!(annotated.event_time, record.event_time);
    }
}
