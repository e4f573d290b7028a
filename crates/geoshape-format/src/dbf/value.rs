//! Fixed-width text encoding of field values.
//!
//! Character values are left-aligned and space padded, numbers are
//! right-aligned with the field's decimal count, logicals are `T`/`F`/`?` and
//! dates are `YYYYMMDD`. A blank slot reads back as `Null`.

use chrono::NaiveDate;
use geoshape_core::error::FormatError;
use geoshape_core::FieldValue;
use std::borrow::Cow;

use super::header::{DbfField, FieldType};

const DATE_FORMAT: &str = "%Y%m%d";

pub(crate) fn decode(field: &DbfField, raw: &[u8]) -> Result<FieldValue, FormatError> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    match field.field_type {
        FieldType::Character | FieldType::Other(_) => {
            if text.is_empty() {
                Ok(FieldValue::Null)
            } else {
                Ok(FieldValue::Character(text.to_string()))
            }
        }
        FieldType::Numeric | FieldType::Float => {
            // dBASE fills overflowed numbers with '*'
            if text.is_empty() || text.bytes().all(|b| b == b'*') {
                return Ok(FieldValue::Null);
            }
            text.parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|_| FormatError::InvalidValue {
                    field: "numeric",
                    reason: "not a number",
                })
        }
        FieldType::Logical => Ok(parse_logical(text).map_or(FieldValue::Null, FieldValue::Logical)),
        FieldType::Date => {
            if text.is_empty() || text.bytes().all(|b| b == b'0') {
                return Ok(FieldValue::Null);
            }
            parse_date(text).map(FieldValue::Date)
        }
    }
}

/// Writes `value` into `out`, which is exactly the field's slot.
pub(crate) fn encode(field: &DbfField, value: &FieldValue, out: &mut [u8]) -> Result<(), FormatError> {
    out.fill(b' ');
    match field.field_type {
        FieldType::Character | FieldType::Other(_) => {
            let Some(text) = as_text(value) else {
                return Ok(());
            };
            let text = truncate_at_char(&text, out.len());
            out[..text.len()].copy_from_slice(text.as_bytes());
        }
        FieldType::Numeric | FieldType::Float => {
            let number = match value {
                FieldValue::Null => return Ok(()),
                FieldValue::Number(n) => *n,
                FieldValue::Character(s) => s.trim().parse::<f64>().map_err(|_| not_a_number())?,
                FieldValue::Logical(_) | FieldValue::Date(_) => return Err(not_a_number()),
            };
            if !number.is_finite() {
                return Err(not_a_number());
            }
            let text = format!("{:.*}", usize::from(field.decimal), number);
            if text.len() > out.len() {
                return Err(FormatError::FieldOverflow {
                    field: field.name.clone(),
                    width: out.len(),
                });
            }
            let start = out.len() - text.len();
            out[start..].copy_from_slice(text.as_bytes());
        }
        FieldType::Logical => {
            let flag = match value {
                FieldValue::Null => b'?',
                FieldValue::Logical(true) => b'T',
                FieldValue::Logical(false) => b'F',
                FieldValue::Character(s) => match parse_logical(s.trim()) {
                    Some(true) => b'T',
                    Some(false) => b'F',
                    None => b'?',
                },
                FieldValue::Number(_) | FieldValue::Date(_) => {
                    return Err(FormatError::InvalidValue {
                        field: "logical",
                        reason: "expected a boolean",
                    })
                }
            };
            out[0] = flag;
        }
        FieldType::Date => {
            let date = match value {
                FieldValue::Null => return Ok(()),
                FieldValue::Date(d) => *d,
                FieldValue::Character(s) => parse_date(s.trim())?,
                FieldValue::Number(_) | FieldValue::Logical(_) => {
                    return Err(FormatError::InvalidValue {
                        field: "date",
                        reason: "expected a date",
                    })
                }
            };
            let text = date.format(DATE_FORMAT).to_string();
            if text.len() > out.len() {
                return Err(FormatError::FieldOverflow {
                    field: field.name.clone(),
                    width: out.len(),
                });
            }
            out[..text.len()].copy_from_slice(text.as_bytes());
        }
    }
    Ok(())
}

fn as_text(value: &FieldValue) -> Option<Cow<'_, str>> {
    match value {
        FieldValue::Null => None,
        FieldValue::Character(s) => Some(Cow::Borrowed(s.as_str())),
        FieldValue::Number(n) => Some(Cow::Owned(n.to_string())),
        FieldValue::Logical(b) => Some(Cow::Borrowed(if *b { "T" } else { "F" })),
        FieldValue::Date(d) => Some(Cow::Owned(d.format(DATE_FORMAT).to_string())),
    }
}

fn truncate_at_char(text: &str, width: usize) -> &str {
    if text.len() <= width {
        return text;
    }
    let mut end = width;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn parse_logical(text: &str) -> Option<bool> {
    match text.bytes().next() {
        Some(b'T' | b't' | b'Y' | b'y') => Some(true),
        Some(b'F' | b'f' | b'N' | b'n') => Some(false),
        _ => None,
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, FormatError> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|_| FormatError::InvalidValue {
        field: "date",
        reason: "expected YYYYMMDD",
    })
}

fn not_a_number() -> FormatError {
    FormatError::InvalidValue {
        field: "numeric",
        reason: "expected a number",
    }
}
