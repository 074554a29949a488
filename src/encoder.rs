// Record Encoder
// One billing entry + its recipient -> fixed-width intake records
//
// Fields are concatenated without delimiters in the order of LAYOUT.
// The encoder is a pure function of its arguments: the processing date and
// the contract bundle are passed in, never read from ambient state.

use crate::codes::ServiceKind;
use crate::config::ContractConstants;
use crate::error::{BillingError, Result};
use crate::models::{BillingDate, BillingEntry, Recipient, MEDICAID_ID_LEN};
use chrono::NaiveDate;

// ============================================================================
// LAYOUT
// ============================================================================

/// One column group of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    /// Column width; 0 marks the variable-width Medicaid ID
    pub width: usize,
}

const fn field(name: &'static str, width: usize) -> Field {
    Field { name, width }
}

/// Record layout in column order
pub const LAYOUT: [Field; 18] = [
    field("billing month", 2),
    field("billing year", 2),
    field("processing date", 6),
    field("form code", 1),
    field("medicaid id", 0),
    field("last name", 5),
    field("first initial", 1),
    field("contract number", 7),
    field("day", 2),
    field("service code", 3),
    field("units", 4),
    field("other code", 1),
    field("other amount", 7),
    field("group size", 2),
    field("county code", 2),
    field("rate", 7),
    field("optional reference", 9),
    field("staff size", 2),
];

const fn fixed_fields_width() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < LAYOUT.len() {
        total += LAYOUT[i].width;
        i += 1;
    }
    total
}

/// Width of every field except the Medicaid ID
pub const FIXED_FIELDS_WIDTH: usize = fixed_fields_width();

/// Length of every record for a 12-digit Medicaid ID
pub const RECORD_LENGTH: usize = FIXED_FIELDS_WIDTH + MEDICAID_ID_LEN;

const LAST_NAME_WIDTH: usize = 5;
const UNITS_WIDTH: usize = 4;
const RATE_WIDTH: usize = 7;
const MAX_UNITS: u32 = 9999;

const OTHER_CODE_FILLER: &str = " ";
const OTHER_AMOUNT_FILLER: &str = "       ";
const REFERENCE_FILLER: &str = "         ";

/// Line order within one entry: work before trip
const LINE_ORDER: [ServiceKind; 2] = [ServiceKind::Work, ServiceKind::Trip];

// ============================================================================
// ENCODING
// ============================================================================

/// Encode one billing entry into zero, one or two records.
///
/// A record is produced for each of work and trip units that is present and
/// non-zero, work first. The entry is rejected as a whole when the recipient
/// is missing, the date is not "MM/DD/YY", a billed kind has no service code,
/// or a quantity does not fit its column; callers skip it and carry on.
pub fn encode_entry(
    entry: &BillingEntry,
    recipient: Option<&Recipient>,
    today: NaiveDate,
    contract: &ContractConstants,
) -> Result<Vec<String>> {
    let recipient = recipient.ok_or(BillingError::DanglingReference {
        recipient_id: entry.recipient_id,
    })?;
    let date = BillingDate::parse(&entry.date)?;

    let mut lines = Vec::with_capacity(LINE_ORDER.len());
    for kind in LINE_ORDER {
        let units = match entry.units(kind) {
            Some(units) if units > 0 => units,
            _ => continue,
        };

        let code = recipient.service_code(kind);
        if code.is_empty() {
            return Err(BillingError::MissingServiceCode {
                recipient_id: recipient.id,
                kind: kind.as_str(),
            });
        }
        if units > MAX_UNITS {
            return Err(BillingError::UnitsOutOfRange { units });
        }

        lines.push(encode_line(&date, recipient, kind, code, units, today, contract)?);
    }

    Ok(lines)
}

fn encode_line(
    date: &BillingDate,
    recipient: &Recipient,
    kind: ServiceKind,
    code: &str,
    units: u32,
    today: NaiveDate,
    contract: &ContractConstants,
) -> Result<String> {
    let processing_date = today.format("%m%d%y").to_string();
    let last_name = last_name_field(&recipient.last_name);
    let initial = first_initial(&recipient.first_name).to_string();
    let units = format!("{:>width$}", units, width = UNITS_WIDTH);
    let rate = format!("{:>width$}", rate(contract, kind), width = RATE_WIDTH);

    // Same order as LAYOUT
    let columns: [&str; LAYOUT.len()] = [
        &date.month,
        &date.year,
        &processing_date,
        &contract.form_code,
        &recipient.medicaid_id,
        &last_name,
        &initial,
        &contract.contract_number,
        &date.day,
        code,
        &units,
        OTHER_CODE_FILLER,
        OTHER_AMOUNT_FILLER,
        &contract.group_size,
        &contract.county_code,
        &rate,
        REFERENCE_FILLER,
        &contract.staff_size,
    ];

    let mut line = String::with_capacity(RECORD_LENGTH);
    for (field, value) in LAYOUT.iter().zip(columns) {
        let actual = value.chars().count();
        if field.width != 0 && actual != field.width {
            return Err(BillingError::FieldWidth {
                field: field.name,
                expected: field.width,
                actual,
            });
        }
        line.push_str(value);
    }

    Ok(line)
}

/// First five characters of the upper-cased last name, space-padded
fn last_name_field(last_name: &str) -> String {
    let upper: String = last_name
        .trim()
        .to_uppercase()
        .chars()
        .take(LAST_NAME_WIDTH)
        .collect();
    format!("{:<width$}", upper, width = LAST_NAME_WIDTH)
}

/// Upper-cased first initial; a blank keeps the column when the name is empty
fn first_initial(first_name: &str) -> char {
    first_name
        .trim()
        .chars()
        .next()
        .and_then(|c| c.to_uppercase().next())
        .unwrap_or(' ')
}

fn rate(contract: &ContractConstants, kind: ServiceKind) -> &str {
    match kind {
        ServiceKind::Work => &contract.work_rate,
        ServiceKind::Trip => &contract.trip_rate,
    }
}
