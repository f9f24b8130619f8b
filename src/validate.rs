//! Per-field constraint checks and submission payload assembly.

use crate::schema::{parse_list, FieldKind, FieldSchema, Record};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

/// Field name -> ordered violation messages. Only failing fields appear.
pub type Violations = IndexMap<String, Vec<String>>;

/// Visual state of one input.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum FieldMark {
    #[default]
    Neutral,
    Valid,
    Invalid(String),
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn is_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).is_ok()
}

pub fn is_date_time(value: &str) -> bool {
    let v = value.trim();
    DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(v, fmt).is_ok())
        || DateTime::parse_from_rfc3339(v).is_ok()
}

fn is_number(value: &str) -> bool {
    value.trim().parse::<f64>().is_ok_and(|n| n.is_finite())
}

fn is_empty_value(field: &FieldSchema, value: &str) -> bool {
    if field.kind.is_list() {
        parse_list(value).is_empty()
    } else {
        value.trim().is_empty()
    }
}

/// Checks one value against its field's constraints.
///
/// Empty values only fail the presence check; every other constraint is
/// skipped for them.
pub fn check_field(field: &FieldSchema, value: &str) -> Vec<String> {
    let label = field.label();
    let mut errors = Vec::new();
    if is_empty_value(field, value) {
        if field.required {
            errors.push(format!("{label} can't be blank"));
        }
        return errors;
    }
    if let Some(max) = field.max_length {
        if field.kind.is_list() {
            if parse_list(value).iter().any(|item| item.chars().count() > max) {
                errors.push(format!(
                    "{label} has an entry that is too long (maximum is {max} characters)"
                ));
            }
        } else if value.chars().count() > max {
            errors.push(format!("{label} is too long (maximum is {max} characters)"));
        }
    }
    match field.kind {
        FieldKind::Numeric => {
            if !is_number(value) {
                errors.push(format!("{label} is not a number"));
            }
        }
        FieldKind::Date => {
            if !is_date(value) {
                errors.push(format!("{label} must be a valid date"));
            }
        }
        FieldKind::DateTime => {
            if !is_date_time(value) {
                errors.push(format!("{label} must be a valid date and time"));
            }
        }
        FieldKind::SingleSelect => {
            if !field.options.iter().any(|o| o == value) {
                errors.push(format!("{label} is not included in the list"));
            }
        }
        FieldKind::MultiChecklist => {
            if parse_list(value)
                .iter()
                .any(|item| !field.options.contains(item))
            {
                errors.push(format!("{label} is not included in the list"));
            }
        }
        _ => {}
    }
    errors
}

/// Evaluates every field in schema order. Fields are independent.
pub fn validate_record(record: &Record) -> Violations {
    let mut out = Violations::new();
    for field in record.schema().fields() {
        let value = record.value(&field.name).unwrap_or("");
        let errors = check_field(field, value);
        if !errors.is_empty() {
            out.insert(field.name.clone(), errors);
        }
    }
    out
}

/// Mark for a single input. Without `finalize` an empty input stays neutral,
/// so untouched fields are not flagged while the user is still typing.
pub fn mark_for(field: &FieldSchema, value: &str, finalize: bool) -> FieldMark {
    if !finalize && is_empty_value(field, value) {
        return FieldMark::Neutral;
    }
    match check_field(field, value).into_iter().next() {
        Some(first) => FieldMark::Invalid(first),
        None => FieldMark::Valid,
    }
}

/// Outgoing payload: every non-empty value, plus empty values of fields that
/// are not nullable. Keys are the field names; values are in backend form.
pub fn build_payload(record: &Record) -> IndexMap<String, String> {
    record
        .schema()
        .fields()
        .iter()
        .filter_map(|f| {
            let v = record.value(&f.name).unwrap_or("");
            if !is_empty_value(f, v) || !f.nullable {
                Some((f.name.clone(), f.encode_stored(v)))
            } else {
                None
            }
        })
        .collect()
}
