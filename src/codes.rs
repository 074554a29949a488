// Code Validator
// Service codes are checked against the whitelist of their category

use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Work service codes accepted by the billing intake
pub const WORK_CODES: [&str; 3] = ["ADF", "AVF", "FVF"];

/// Transportation service codes accepted by the billing intake
pub const TRIP_CODES: [&str; 2] = ["ATB", "FTB"];

/// Width of a service code column
pub const CODE_WIDTH: usize = 3;

// ============================================================================
// SERVICE KIND
// ============================================================================

/// The two billable service categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceKind {
    Work,
    Trip,
}

impl ServiceKind {
    /// Lowercase name used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Work => "work",
            ServiceKind::Trip => "trip",
        }
    }

    /// Human-readable name of the recipient field holding this kind's code
    pub fn code_field(&self) -> &'static str {
        match self {
            ServiceKind::Work => "work service code",
            ServiceKind::Trip => "trip service code",
        }
    }

    pub fn whitelist(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::Work => &WORK_CODES,
            ServiceKind::Trip => &TRIP_CODES,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "work" => Ok(ServiceKind::Work),
            "trip" => Ok(ServiceKind::Trip),
            other => Err(format!("unknown service type '{}'", other)),
        }
    }
}

impl TryFrom<String> for ServiceKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceKind> for String {
    fn from(kind: ServiceKind) -> Self {
        kind.as_str().to_string()
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate and normalize a service code for the given category.
///
/// Empty input means "not billed" and normalizes to an empty string.
/// Anything else is upper-cased and must be a member of the category's
/// whitelist, otherwise `InvalidCode` names the field and the rejected value.
pub fn validate_code(raw: &str, kind: ServiceKind) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let upper = trimmed.to_uppercase();
    if !kind.whitelist().contains(&upper.as_str()) {
        return Err(BillingError::InvalidCode {
            field: kind.code_field(),
            value: raw.to_string(),
        });
    }

    Ok(upper.chars().take(CODE_WIDTH).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_codes_accepted_in_any_case() {
        for code in WORK_CODES {
            assert_eq!(validate_code(code, ServiceKind::Work).unwrap(), code);
            assert_eq!(
                validate_code(&code.to_lowercase(), ServiceKind::Work).unwrap(),
                code
            );
        }
    }

    #[test]
    fn test_trip_codes_accepted_in_any_case() {
        assert_eq!(validate_code("atb", ServiceKind::Trip).unwrap(), "ATB");
        assert_eq!(validate_code("Ftb", ServiceKind::Trip).unwrap(), "FTB");
    }

    #[test]
    fn test_empty_code_means_not_billed() {
        assert_eq!(validate_code("", ServiceKind::Work).unwrap(), "");
        assert_eq!(validate_code("   ", ServiceKind::Trip).unwrap(), "");
    }

    #[test]
    fn test_codes_from_the_other_category_rejected() {
        assert!(validate_code("ATB", ServiceKind::Work).is_err());
        assert!(validate_code("ADF", ServiceKind::Trip).is_err());
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for bad in ["XYZ", "AD", "ADFX", "A D F", "123"] {
            let err = validate_code(bad, ServiceKind::Work).unwrap_err();
            match err {
                BillingError::InvalidCode { field, value } => {
                    assert_eq!(field, "work service code");
                    assert_eq!(value, bad);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_service_kind_parse() {
        assert_eq!("Work".parse::<ServiceKind>().unwrap(), ServiceKind::Work);
        assert_eq!(" TRIP ".parse::<ServiceKind>().unwrap(), ServiceKind::Trip);
        assert!("bus".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn test_service_kind_serde() {
        let kind: ServiceKind = serde_json::from_str("\"Trip\"").unwrap();
        assert_eq!(kind, ServiceKind::Trip);
        assert_eq!(serde_json::to_string(&ServiceKind::Work).unwrap(), "\"work\"");
    }
}
