//! Core Report 5 types
//!
//! Shared across storage, timeline navigation, and report assembly:
//! - [`Timestamp`]: the server-assigned ordering key of every status record
//! - [`StatusRecord`]: one form submission describing a tank at an instant
//! - [`FieldValue`] / [`Issue`]: the dynamically-typed form answers

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: u32 = 1_000_000_000;

// ============================================================================
// Timestamp
// ============================================================================

/// Server-assigned instant with sub-second precision.
///
/// Two integer components compared lexicographically by
/// `(seconds, nanoseconds)`; the derived `Ord` relies on field order.
/// `nanoseconds` is always below one second, including after
/// deserialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawTimestamp")]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

/// Wire form of [`Timestamp`] before the nanosecond carry.
#[derive(Deserialize)]
struct RawTimestamp {
    seconds: i64,
    nanoseconds: u32,
}

impl From<RawTimestamp> for Timestamp {
    fn from(raw: RawTimestamp) -> Self {
        Self::new(raw.seconds, raw.nanoseconds)
    }
}

impl Timestamp {
    /// Earliest representable instant; used as an open lower query bound.
    pub const MIN: Self = Self {
        seconds: i64::MIN,
        nanoseconds: 0,
    };

    /// Latest representable instant; used as an open upper query bound.
    pub const MAX: Self = Self {
        seconds: i64::MAX,
        nanoseconds: NANOS_PER_SEC - 1,
    };

    /// Build a timestamp, carrying excess nanoseconds into seconds.
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        let carry = i64::from(nanoseconds / NANOS_PER_SEC);
        Self {
            seconds: seconds.saturating_add(carry),
            nanoseconds: nanoseconds % NANOS_PER_SEC,
        }
    }

    /// Current wall-clock instant.
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self::new(dt.timestamp(), dt.timestamp_subsec_nanos())
    }

    /// Convert to a UTC datetime.
    ///
    /// Instants outside chrono's range collapse to the Unix epoch; they only
    /// occur for the open query bounds [`Timestamp::MIN`] / [`Timestamp::MAX`].
    pub fn to_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.seconds, self.nanoseconds).unwrap_or_default()
    }

    /// The next representable instant (one nanosecond later).
    pub fn succ(&self) -> Self {
        if self.nanoseconds + 1 < NANOS_PER_SEC {
            Self {
                seconds: self.seconds,
                nanoseconds: self.nanoseconds + 1,
            }
        } else {
            Self {
                seconds: self.seconds.saturating_add(1),
                nanoseconds: 0,
            }
        }
    }

    /// Milliseconds since the Unix epoch (truncating).
    pub fn as_millis(&self) -> i64 {
        self.seconds
            .saturating_mul(1000)
            .saturating_add(i64::from(self.nanoseconds / 1_000_000))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// Error returned when a timestamp string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp '{0}': expected SECONDS[.FRACTION] or RFC 3339")]
pub struct ParseTimestampError(pub String);

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    /// Accepts `SECONDS`, `SECONDS.FRACTION` (up to nine fraction digits)
    /// or an RFC 3339 datetime.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || ParseTimestampError(s.to_string());

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::from_datetime(&dt));
        }

        let (secs, frac) = match s.split_once('.') {
            Some((secs, frac)) => (secs, Some(frac)),
            None => (s, None),
        };
        let seconds: i64 = secs.parse().map_err(|_| err())?;
        let nanoseconds = match frac {
            None => 0,
            Some(frac) => {
                if frac.is_empty() || frac.len() > 9 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err());
                }
                let padded = format!("{frac:0<9}");
                padded.parse::<u32>().map_err(|_| err())?
            }
        };
        Ok(Self::new(seconds, nanoseconds))
    }
}

// ============================================================================
// Tank identity
// ============================================================================

/// Stable identifier of a tracked tank (e.g. "191").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TankId(pub String);

impl TankId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TankId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TankId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Field values
// ============================================================================

/// An open issue attached to a record (armament or comms failure list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub failure: String,
    #[serde(default)]
    pub fixed: bool,
    pub creation_date: Timestamp,
}

/// A single form answer.
///
/// Untagged on the wire so records stay flat JSON objects. Variant order
/// matters for deserialization: `null` must match before anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Issues(Vec<Issue>),
}

impl FieldValue {
    /// Finite numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

// ============================================================================
// Status records
// ============================================================================

/// One timestamped submission describing a tank's full state.
///
/// Append-only: never mutated or deleted once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub tank_id: TankId,
    pub timestamp: Timestamp,
    /// Submitting user, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Form answers keyed by question text
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl StatusRecord {
    pub fn new(tank_id: impl Into<TankId>, timestamp: Timestamp) -> Self {
        Self {
            tank_id: tank_id.into(),
            timestamp,
            user: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter, mostly for fixtures and imports.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Finite numeric value of a field; anything else is `None`.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(FieldValue::as_number)
    }
}

/// A submission before the store assigns its timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStatus {
    pub tank_id: TankId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl NewStatus {
    /// Attach a server timestamp, producing the storable record.
    ///
    /// A client-supplied `timestamp` answer is dropped; the server's wins.
    pub fn into_record(mut self, timestamp: Timestamp) -> StatusRecord {
        self.fields.remove("timestamp");
        StatusRecord {
            tank_id: self.tank_id,
            timestamp,
            user: self.user,
            fields: self.fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_is_lexicographic() {
        let a = Timestamp::new(10, 999);
        let b = Timestamp::new(11, 0);
        let c = Timestamp::new(11, 1);
        assert!(a < b);
        assert!(b < c);
        assert!(a < c);
        assert_eq!(Timestamp::new(5, 5), Timestamp::new(5, 5));
        assert_ne!(Timestamp::new(5, 5), Timestamp::new(5, 6));
    }

    #[test]
    fn test_new_normalises_nanoseconds() {
        let ts = Timestamp::new(1, 2_500_000_000);
        assert_eq!(ts.seconds, 3);
        assert_eq!(ts.nanoseconds, 500_000_000);
    }

    #[test]
    fn test_succ_rolls_over() {
        let ts = Timestamp::new(7, NANOS_PER_SEC - 1).succ();
        assert_eq!(ts, Timestamp::new(8, 0));
        assert_eq!(Timestamp::new(7, 3).succ(), Timestamp::new(7, 4));
    }

    #[test]
    fn test_parse_seconds_and_fraction() {
        assert_eq!("1700000000".parse::<Timestamp>().unwrap(), Timestamp::new(1_700_000_000, 0));
        assert_eq!(
            "1700000000.5".parse::<Timestamp>().unwrap(),
            Timestamp::new(1_700_000_000, 500_000_000)
        );
        assert_eq!(
            "1700000000.000000001".parse::<Timestamp>().unwrap(),
            Timestamp::new(1_700_000_000, 1)
        );
        assert!("abc".parse::<Timestamp>().is_err());
        assert!("1.".parse::<Timestamp>().is_err());
        assert!("1.1234567890".parse::<Timestamp>().is_err());
    }

    #[test]
    fn test_parse_rfc3339() {
        let ts: Timestamp = "2025-02-10T12:00:00Z".parse().unwrap();
        assert_eq!(ts.to_utc().to_rfc3339(), "2025-02-10T12:00:00+00:00");
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let ts = Timestamp::new(1_739_188_800, 42);
        assert_eq!(ts.to_string(), "1739188800.000000042");
        assert_eq!(ts.to_string().parse::<Timestamp>().unwrap(), ts);
    }

    #[test]
    fn test_deserialize_carries_excess_nanoseconds() {
        let ts: Timestamp =
            serde_json::from_str(r#"{"seconds":1739188800,"nanoseconds":2000000000}"#).unwrap();
        assert_eq!(ts, Timestamp::new(1_739_188_802, 0));
        assert_eq!(ts.nanoseconds, 0);

        let record: StatusRecord = serde_json::from_value(serde_json::json!({
            "tankId": "191",
            "timestamp": {"seconds": 10, "nanoseconds": 1500000000u32}
        }))
        .unwrap();
        assert_eq!(record.timestamp, Timestamp::new(11, 500_000_000));
        assert!(record.timestamp > Timestamp::new(10, NANOS_PER_SEC - 1));
    }

    #[test]
    fn test_record_json_is_flat() {
        let record = StatusRecord::new("191", Timestamp::new(100, 0))
            .with_field("ק\"מ", 500.0)
            .with_field("כשירות (GPS)", true);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tankId"], "191");
        assert_eq!(value["timestamp"]["seconds"], 100);
        assert_eq!(value["ק\"מ"], 500.0);
        assert_eq!(value["כשירות (GPS)"], true);

        let back: StatusRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_field_value_untagged_decoding() {
        let json = serde_json::json!({
            "tankId": "425",
            "timestamp": {"seconds": 1, "nanoseconds": 0},
            "הערות": null,
            "שילוט": "abc",
            "תקלות קשר": [
                {"failure": "radio", "creationDate": {"seconds": 0, "nanoseconds": 0}}
            ]
        });
        let record: StatusRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.field("הערות"), Some(&FieldValue::Null));
        assert_eq!(record.field("שילוט"), Some(&FieldValue::Text("abc".into())));
        match record.field("תקלות קשר") {
            Some(FieldValue::Issues(issues)) => {
                assert_eq!(issues.len(), 1);
                assert!(!issues[0].fixed);
            }
            other => panic!("expected issues, got {other:?}"),
        }
    }

    #[test]
    fn test_number_ignores_non_numeric() {
        let record = StatusRecord::new("1", Timestamp::default())
            .with_field("a", "12")
            .with_field("b", 12.0)
            .with_field("c", f64::NAN);
        assert_eq!(record.number("a"), None);
        assert_eq!(record.number("b"), Some(12.0));
        assert_eq!(record.number("c"), None);
        assert_eq!(record.number("missing"), None);
    }
}
