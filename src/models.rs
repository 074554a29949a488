// Domain records: recipients, weekly schedules and billing entries
// Request payloads are typed and reject unknown keys

use crate::codes::{validate_code, ServiceKind};
use crate::error::{BillingError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday as ChronoWeekday};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Medicaid IDs are 12 digits
pub const MEDICAID_ID_LEN: usize = 12;

// ============================================================================
// RECIPIENT
// ============================================================================

/// A service recipient as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: i64,

    #[serde(rename = "Last_Name")]
    pub last_name: String,

    #[serde(rename = "First_Name")]
    pub first_name: String,

    #[serde(rename = "Medicaid_ID")]
    pub medicaid_id: String,

    /// One of ADF/AVF/FVF, or empty when work is not billed
    #[serde(rename = "Work_Service_Code")]
    pub work_service_code: String,

    /// One of ATB/FTB, or empty when transportation is not billed
    #[serde(rename = "Trip_Service_Code")]
    pub trip_service_code: String,
}

impl Recipient {
    /// Service code billed for the given kind of service
    pub fn service_code(&self, kind: ServiceKind) -> &str {
        match kind {
            ServiceKind::Work => &self.work_service_code,
            ServiceKind::Trip => &self.trip_service_code,
        }
    }
}

/// Recipient creation payload.
///
/// Every field is named; unknown keys are rejected at deserialization and
/// [`NewRecipient::validate`] normalizes the rest before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewRecipient {
    #[serde(rename = "Last_Name")]
    pub last_name: String,

    #[serde(rename = "First_Name")]
    pub first_name: String,

    #[serde(rename = "Medicaid_ID")]
    pub medicaid_id: String,

    #[serde(rename = "Work_Service_Code", default)]
    pub work_service_code: String,

    #[serde(rename = "Trip_Service_Code", default)]
    pub trip_service_code: String,
}

impl NewRecipient {
    /// Trim names, check the Medicaid ID and normalize both service codes.
    pub fn validate(self) -> Result<NewRecipient> {
        let last_name = self.last_name.trim().to_string();
        if last_name.is_empty() {
            return Err(BillingError::InvalidName { field: "Last_Name" });
        }

        let first_name = self.first_name.trim().to_string();
        if first_name.is_empty() {
            return Err(BillingError::InvalidName { field: "First_Name" });
        }

        let medicaid_id = self.medicaid_id.trim().to_string();
        if medicaid_id.len() != MEDICAID_ID_LEN || !medicaid_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(BillingError::InvalidMedicaidId(self.medicaid_id));
        }

        Ok(NewRecipient {
            last_name,
            first_name,
            medicaid_id,
            work_service_code: validate_code(&self.work_service_code, ServiceKind::Work)?,
            trip_service_code: validate_code(&self.trip_service_code, ServiceKind::Trip)?,
        })
    }
}

// ============================================================================
// SCHEDULE
// ============================================================================

/// Days a recipient can be scheduled for service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
        }
    }

    /// Position in the service week, Monday = 0
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Weekday::ALL
            .into_iter()
            .find(|day| day.as_str() == lower)
            .ok_or_else(|| format!("unknown weekday '{}'", s))
    }
}

impl TryFrom<String> for Weekday {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Weekday> for String {
    fn from(day: Weekday) -> Self {
        day.as_str().to_string()
    }
}

/// A recurring weekly service slot for one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: i64,
    pub recipient_id: i64,
    pub weekday: Weekday,
    pub service_type: ServiceKind,
}

/// Schedule creation payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewSchedule {
    #[serde(deserialize_with = "deserialize_id")]
    pub recipient_id: i64,
    pub weekday: Weekday,
    pub service_type: ServiceKind,
}

// ============================================================================
// BILLING ENTRY
// ============================================================================

/// Units billed for one recipient on one date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEntry {
    pub id: i64,
    pub recipient_id: i64,
    /// "MM/DD/YY" as submitted
    pub date: String,
    pub work_units: Option<u32>,
    pub trip_units: Option<u32>,
}

impl BillingEntry {
    pub fn units(&self, kind: ServiceKind) -> Option<u32> {
        match kind {
            ServiceKind::Work => self.work_units,
            ServiceKind::Trip => self.trip_units,
        }
    }
}

/// Billing entry as submitted by the input form.
///
/// Unit fields stay loosely typed here; [`parse_units`] decides what counts
/// as a quantity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBillingEntry {
    #[serde(deserialize_with = "deserialize_id")]
    pub recipient_id: i64,
    pub date: String,
    #[serde(default)]
    pub work_units: Value,
    #[serde(default)]
    pub trip_units: Value,
}

/// Billing entry ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBillingEntry {
    pub recipient_id: i64,
    pub date: String,
    pub work_units: Option<u32>,
    pub trip_units: Option<u32>,
}

impl RawBillingEntry {
    /// Parse both unit fields; `None` when the entry bills nothing.
    pub fn into_billable(self) -> Option<NewBillingEntry> {
        let work_units = parse_units(&self.work_units);
        let trip_units = parse_units(&self.trip_units);

        let bills_something = work_units.unwrap_or(0) > 0 || trip_units.unwrap_or(0) > 0;
        if !bills_something {
            return None;
        }

        Some(NewBillingEntry {
            recipient_id: self.recipient_id,
            date: self.date.trim().to_string(),
            work_units,
            trip_units,
        })
    }
}

/// Parse a submitted unit quantity, treating anything unusable as absent.
///
/// Accepted: a non-negative JSON integer, or a string of ASCII digits
/// (surrounding whitespace ignored). Everything else (empty strings, signs,
/// decimals, words, booleans, null, values beyond `u32`) yields `None`.
pub fn parse_units(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            s.parse().ok()
        }
        _ => None,
    }
}

// ============================================================================
// DATES
// ============================================================================

/// A billing date split into its "MM/DD/YY" components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingDate {
    pub month: String,
    pub day: String,
    pub year: String,
}

impl BillingDate {
    /// Parse "MM/DD/YY": exactly three two-digit components naming a real day.
    pub fn parse(raw: &str) -> Result<BillingDate> {
        let malformed = |reason: &str| BillingError::MalformedEntry {
            date: raw.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = raw.trim().split('/').collect();
        if parts.len() != 3 {
            return Err(malformed("expected MM/DD/YY"));
        }
        if parts
            .iter()
            .any(|p| p.len() != 2 || !p.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(malformed("each date component must be two digits"));
        }

        let date = BillingDate {
            month: parts[0].to_string(),
            day: parts[1].to_string(),
            year: parts[2].to_string(),
        };
        if date.calendar_date().is_none() {
            return Err(malformed("not a calendar date"));
        }

        Ok(date)
    }

    /// The calendar day, reading two-digit years as 20YY
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        let year: i32 = self.year.parse().ok()?;
        let month: u32 = self.month.parse().ok()?;
        let day: u32 = self.day.parse().ok()?;
        NaiveDate::from_ymd_opt(2000 + year, month, day)
    }
}

/// Expand a Monday into the five "MM/DD/YY" dates of its service week.
///
/// Accepts "MMDDYY" or "MM/DD/YY"; rejects dates that are not Mondays.
pub fn billing_week(monday: &str) -> Result<Vec<String>> {
    let trimmed = monday.trim();
    let slashed = if trimmed.len() == 6 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}/{}/{}", &trimmed[0..2], &trimmed[2..4], &trimmed[4..6])
    } else {
        trimmed.to_string()
    };

    let start = BillingDate::parse(&slashed)?
        .calendar_date()
        .ok_or_else(|| BillingError::MalformedEntry {
            date: monday.to_string(),
            reason: "not a calendar date".to_string(),
        })?;

    if start.weekday() != ChronoWeekday::Mon {
        return Err(BillingError::MalformedEntry {
            date: monday.to_string(),
            reason: "the date does not fall on a Monday".to_string(),
        });
    }

    Ok((0..Weekday::ALL.len() as i64)
        .map(|offset| (start + Duration::days(offset)).format("%m/%d/%y").to_string())
        .collect())
}

// ============================================================================
// SERDE HELPERS
// ============================================================================

/// Accept an identifier sent either as a JSON number or a numeric string
fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(i64),
        Text(String),
    }

    match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(n) => Ok(n),
        IdRepr::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid recipient_id '{}'", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_recipient() -> NewRecipient {
        NewRecipient {
            last_name: " Smith ".to_string(),
            first_name: "Jane".to_string(),
            medicaid_id: "123456789012".to_string(),
            work_service_code: "adf".to_string(),
            trip_service_code: String::new(),
        }
    }

    #[test]
    fn test_parse_units_accepts_integers_and_digit_strings() {
        assert_eq!(parse_units(&json!(5)), Some(5));
        assert_eq!(parse_units(&json!(0)), Some(0));
        assert_eq!(parse_units(&json!("12")), Some(12));
        assert_eq!(parse_units(&json!(" 7 ")), Some(7));
    }

    #[test]
    fn test_parse_units_treats_bad_input_as_absent() {
        for value in [
            json!(null),
            json!(""),
            json!("  "),
            json!("abc"),
            json!("-3"),
            json!("2.5"),
            json!(-3),
            json!(2.5),
            json!(true),
            json!([1]),
            json!("99999999999"),
        ] {
            assert_eq!(parse_units(&value), None, "value {value} should be absent");
        }
    }

    #[test]
    fn test_raw_entry_with_nothing_billable_is_dropped() {
        let raw: RawBillingEntry = serde_json::from_value(json!({
            "recipient_id": 1, "date": "03/15/24", "work_units": "", "trip_units": "0"
        }))
        .unwrap();
        assert!(raw.into_billable().is_none());

        let raw: RawBillingEntry =
            serde_json::from_value(json!({"recipient_id": 1, "date": "03/15/24"})).unwrap();
        assert!(raw.into_billable().is_none());
    }

    #[test]
    fn test_raw_entry_keeps_billable_units() {
        let raw: RawBillingEntry = serde_json::from_value(json!({
            "recipient_id": "4", "date": " 03/15/24 ", "work_units": "6", "trip_units": "x"
        }))
        .unwrap();
        let entry = raw.into_billable().unwrap();
        assert_eq!(entry.recipient_id, 4);
        assert_eq!(entry.date, "03/15/24");
        assert_eq!(entry.work_units, Some(6));
        assert_eq!(entry.trip_units, None);
    }

    #[test]
    fn test_raw_entry_rejects_unknown_keys() {
        let result: std::result::Result<RawBillingEntry, _> = serde_json::from_value(json!({
            "recipient_id": 1, "date": "03/15/24", "work_units": 1, "notes": "x"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_new_recipient_normalizes() {
        let recipient = new_recipient().validate().unwrap();
        assert_eq!(recipient.last_name, "Smith");
        assert_eq!(recipient.work_service_code, "ADF");
        assert_eq!(recipient.trip_service_code, "");
    }

    #[test]
    fn test_new_recipient_rejects_bad_fields() {
        let mut bad = new_recipient();
        bad.work_service_code = "ATB".to_string();
        assert!(matches!(bad.validate(), Err(BillingError::InvalidCode { .. })));

        let mut bad = new_recipient();
        bad.medicaid_id = "12345".to_string();
        assert!(matches!(bad.validate(), Err(BillingError::InvalidMedicaidId(_))));

        let mut bad = new_recipient();
        bad.first_name = "  ".to_string();
        assert!(matches!(bad.validate(), Err(BillingError::InvalidName { .. })));
    }

    #[test]
    fn test_stored_medicaid_id_is_twelve_digits() {
        for id in ["M12345", "12345678901A", "1234567890123", ""] {
            let mut bad = new_recipient();
            bad.medicaid_id = id.to_string();
            assert!(matches!(bad.validate(), Err(BillingError::InvalidMedicaidId(_))), "{id}");
        }

        let mut ok = new_recipient();
        ok.medicaid_id = " 000000000042 ".to_string();
        assert_eq!(ok.validate().unwrap().medicaid_id, "000000000042");
    }

    #[test]
    fn test_new_recipient_wire_names() {
        let recipient: NewRecipient = serde_json::from_value(json!({
            "Last_Name": "Smith",
            "First_Name": "Jane",
            "Medicaid_ID": "123456789012",
            "Work_Service_Code": "ADF"
        }))
        .unwrap();
        assert_eq!(recipient.trip_service_code, "");

        let unknown: std::result::Result<NewRecipient, _> = serde_json::from_value(json!({
            "Last_Name": "Smith",
            "First_Name": "Jane",
            "Medicaid_ID": "123456789012",
            "name": "Jane Smith"
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_billing_date_parse() {
        let date = BillingDate::parse("03/15/24").unwrap();
        assert_eq!(date.month, "03");
        assert_eq!(date.day, "15");
        assert_eq!(date.year, "24");
        assert_eq!(date.calendar_date(), NaiveDate::from_ymd_opt(2024, 3, 15));
    }

    #[test]
    fn test_billing_date_rejects_malformed() {
        for raw in ["13/40/99", "2024-01-01", "03/15", "03/15/24/1", "3/15/24", "03//24", "02/30/24", ""] {
            assert!(BillingDate::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_billing_week_from_monday() {
        let week = billing_week("030424").unwrap();
        assert_eq!(week, vec!["03/04/24", "03/05/24", "03/06/24", "03/07/24", "03/08/24"]);

        let week = billing_week("12/30/24").unwrap();
        assert_eq!(week[4], "01/03/25");
    }

    #[test]
    fn test_billing_week_rejects_other_days() {
        assert!(billing_week("030524").is_err());
        assert!(billing_week("0304").is_err());
    }

    #[test]
    fn test_weekday_and_schedule_payload() {
        let schedule: NewSchedule = serde_json::from_value(json!({
            "recipient_id": "3", "weekday": "Monday", "service_type": "WORK"
        }))
        .unwrap();
        assert_eq!(schedule.recipient_id, 3);
        assert_eq!(schedule.weekday, Weekday::Monday);
        assert_eq!(schedule.service_type, ServiceKind::Work);

        assert!(serde_json::from_value::<NewSchedule>(json!({
            "recipient_id": 3, "weekday": "sunday", "service_type": "work"
        }))
        .is_err());
        assert!(Weekday::Tuesday < Weekday::Friday);
        assert_eq!(Weekday::Thursday.index(), 3);
    }
}
