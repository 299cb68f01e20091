//! Mapping parsed table rows onto the `qb_weekly_data` record shape.
//!
//! Column lookup is case-insensitive and alias-tolerant. The field table below
//! is the single source of truth for which source columns feed which output
//! field and what happens when they are missing:
//!
//! - `Required` fields reject the row when absent or not coercible.
//! - `Defaulted` fields fall back to empty text / zero when every alias is
//!   absent, but still reject the row when a present value does not coerce.
//! - `Optional` fields are left out when absent or not coercible.
//!
//! A rejected row is logged and skipped; the rest of the batch still maps.

use crate::types::{BetOutcome, MappingError, OutputRecord, TabularData};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How a raw cell is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Decimal,
    Bet,
}

/// What a missing or bad value means for the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Defaulted,
    Optional,
}

/// One output field and the source columns that may feed it
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// Output field name
    pub name: &'static str,
    /// Lowercase source column names, tried in order
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub presence: Presence,
}

const fn field(
    name: &'static str,
    aliases: &'static [&'static str],
    kind: FieldKind,
    presence: Presence,
) -> FieldRule {
    FieldRule {
        name,
        aliases,
        kind,
        presence,
    }
}

pub const FIELD_RULES: &[FieldRule] = &[
    field("player", &["player"], FieldKind::Text, Presence::Defaulted),
    field("week", &["week"], FieldKind::Integer, Presence::Required),
    field("opponent", &["opponent"], FieldKind::Text, Presence::Defaulted),
    field("passing_yards", &["passing_yards", "yards"], FieldKind::Integer, Presence::Required),
    field("accuracy_pct", &["accuracy_pct", "accuracy"], FieldKind::Decimal, Presence::Defaulted),
    field("comp_pct", &["comp_pct", "completion", "comp %"], FieldKind::Decimal, Presence::Defaulted),
    field("btt_rate", &["btt_rate", "btt"], FieldKind::Decimal, Presence::Defaulted),
    field("twp_rate", &["twp_rate", "twp"], FieldKind::Decimal, Presence::Defaulted),
    field("prop_line", &["prop_line", "prop"], FieldKind::Decimal, Presence::Optional),
    field("bet_result", &["bet_result", "result"], FieldKind::Bet, Presence::Optional),
];

/// A coerced cell value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i32),
    Decimal(f64),
    Bet(BetOutcome),
}

impl FieldKind {
    fn coerce(self, raw: &str) -> Option<FieldValue> {
        match self {
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::Integer => raw.parse().ok().map(FieldValue::Integer),
            FieldKind::Decimal => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FieldValue::Decimal),
            FieldKind::Bet => BetOutcome::parse(raw).map(FieldValue::Bet),
        }
    }

    fn default_value(self) -> Option<FieldValue> {
        match self {
            FieldKind::Text => Some(FieldValue::Text(String::new())),
            FieldKind::Integer => Some(FieldValue::Integer(0)),
            FieldKind::Decimal => Some(FieldValue::Decimal(0.0)),
            FieldKind::Bet => None,
        }
    }
}

/// Lowercased header → trimmed cell for one row
///
/// Cells past the header width are ignored and missing trailing cells are
/// simply absent. Duplicate headers keep the rightmost cell.
fn row_lookup<'a>(headers: &[String], row: &'a [String]) -> HashMap<String, &'a str> {
    headers
        .iter()
        .zip(row.iter())
        .map(|(header, cell)| (header.trim().to_lowercase(), cell.trim()))
        .collect()
}

/// Resolve one field against a row lookup
pub fn resolve(
    rule: &FieldRule,
    lookup: &HashMap<String, &str>,
) -> Result<Option<FieldValue>, MappingError> {
    let raw = rule
        .aliases
        .iter()
        .find_map(|alias| lookup.get(*alias).copied().filter(|v| !v.is_empty()));

    let Some(raw) = raw else {
        return match rule.presence {
            Presence::Required => Err(MappingError::MissingField(rule.name)),
            Presence::Defaulted => Ok(rule.kind.default_value()),
            Presence::Optional => Ok(None),
        };
    };

    match rule.kind.coerce(raw) {
        Some(value) => Ok(Some(value)),
        None if rule.presence == Presence::Optional => {
            debug!("Dropping optional {} value {:?}", rule.name, raw);
            Ok(None)
        }
        None => Err(MappingError::InvalidValue {
            field: rule.name,
            value: raw.to_string(),
        }),
    }
}

/// Map a single row, failing on the first required field that does not coerce
pub fn map_row(headers: &[String], row: &[String]) -> Result<OutputRecord, MappingError> {
    let lookup = row_lookup(headers, row);

    let mut values = HashMap::new();
    for rule in FIELD_RULES {
        if let Some(value) = resolve(rule, &lookup)? {
            values.insert(rule.name, value);
        }
    }

    Ok(OutputRecord {
        player: take_text(&mut values, "player")?,
        week: take_integer(&mut values, "week")?,
        opponent: take_text(&mut values, "opponent")?,
        passing_yards: take_integer(&mut values, "passing_yards")?,
        accuracy_pct: take_decimal(&mut values, "accuracy_pct")?,
        comp_pct: take_decimal(&mut values, "comp_pct")?,
        btt_rate: take_decimal(&mut values, "btt_rate")?,
        twp_rate: take_decimal(&mut values, "twp_rate")?,
        prop_line: take_decimal(&mut values, "prop_line").ok(),
        bet_result: match values.remove("bet_result") {
            Some(FieldValue::Bet(outcome)) => Some(outcome),
            _ => None,
        },
    })
}

fn take_text(
    values: &mut HashMap<&'static str, FieldValue>,
    name: &'static str,
) -> Result<String, MappingError> {
    match values.remove(name) {
        Some(FieldValue::Text(text)) => Ok(text),
        _ => Err(MappingError::MissingField(name)),
    }
}

fn take_integer(
    values: &mut HashMap<&'static str, FieldValue>,
    name: &'static str,
) -> Result<i32, MappingError> {
    match values.remove(name) {
        Some(FieldValue::Integer(n)) => Ok(n),
        _ => Err(MappingError::MissingField(name)),
    }
}

fn take_decimal(
    values: &mut HashMap<&'static str, FieldValue>,
    name: &'static str,
) -> Result<f64, MappingError> {
    match values.remove(name) {
        Some(FieldValue::Decimal(n)) => Ok(n),
        _ => Err(MappingError::MissingField(name)),
    }
}

/// Map every row, dropping (and logging) the ones that fail
pub fn map_rows(headers: &[String], rows: &[Vec<String>]) -> Vec<OutputRecord> {
    rows.iter()
        .filter_map(|row| match map_row(headers, row) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Failed to parse row {:?}: {}", row, e);
                None
            }
        })
        .collect()
}

/// Convenience wrapper over [`map_rows`] for a parsed table
pub fn map_table(table: &TabularData) -> Vec<OutputRecord> {
    map_rows(&table.headers, &table.rows)
}
