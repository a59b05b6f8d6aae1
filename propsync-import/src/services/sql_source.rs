//! WPL SQL export parser
//!
//! Reads the `wp_wpl_properties` dump (MySQL `INSERT INTO ... VALUES`
//! statements) and produces typed legacy records. This is the only place
//! that knows the flat table's column positions; everything downstream
//! works with `LegacyPropertyRecord`.

use std::path::Path;

use propsync_common::{Error, Result};

use crate::models::LegacyPropertyRecord;

/// Minimum column count for a row to be considered a property tuple
const MIN_COLUMNS: usize = 50;

/// Parse an export file from disk
pub fn parse_export_file(path: &Path) -> Result<Vec<LegacyPropertyRecord>> {
    let sql = std::fs::read_to_string(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("read export {}: {}", path.display(), e),
        ))
    })?;
    parse_export(&sql)
}

/// Parse export SQL text into importable records, sorted by id
///
/// Rows that are soft-deleted, id-less or too short are dropped. Duplicate
/// ids keep the first occurrence.
pub fn parse_export(sql: &str) -> Result<Vec<LegacyPropertyRecord>> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for values_str in find_insert_payloads(sql) {
        for row in split_rows(values_str) {
            let values = split_values(&row);
            if values.len() < MIN_COLUMNS {
                skipped += 1;
                continue;
            }

            let record = record_from_values(&values);
            if record.is_importable() {
                records.push(record);
            } else {
                skipped += 1;
            }
        }
    }

    records.sort_by_key(|r| r.id);
    records.dedup_by_key(|r| r.id);

    tracing::info!(
        parsed = records.len(),
        skipped = skipped,
        "Parsed WPL property export"
    );

    Ok(records)
}

/// Find the `(...)` payload of every wp_wpl_properties INSERT statement
///
/// The payload spans until the first `;` outside a string literal; MySQL
/// dumps put megabytes of HTML inside the literals, so a naive regex over
/// the statement body is not an option.
fn find_insert_payloads(sql: &str) -> Vec<&str> {
    const NEEDLE: &str = "INSERT INTO `wp_wpl_properties`";

    let mut payloads = Vec::new();
    let mut search_from = 0;

    while let Some(pos) = sql[search_from..].find(NEEDLE) {
        let stmt_start = search_from + pos + NEEDLE.len();
        let rest = &sql[stmt_start..];

        let Some(values_rel) = rest.find("VALUES") else {
            break;
        };
        let body = &rest[values_rel + "VALUES".len()..];

        let end = statement_end(body);
        payloads.push(&body[..end]);
        search_from = stmt_start + values_rel + end;
    }

    payloads
}

/// Index of the terminating `;` (or end of input) outside string literals
fn statement_end(body: &str) -> usize {
    let mut in_string = false;
    let mut escape = false;

    for (i, ch) in body.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '\'' => in_string = !in_string,
            ';' if !in_string => return i,
            _ => {}
        }
    }

    body.len()
}

/// Split `(...),(...),(...)` into individual row bodies
fn split_rows(payload: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for ch in payload.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => {
                current.push(ch);
                escape = true;
            }
            '\'' => {
                current.push(ch);
                in_string = !in_string;
            }
            '(' if !in_string => {
                depth += 1;
                if depth > 1 {
                    current.push(ch);
                }
            }
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    rows.push(std::mem::take(&mut current));
                } else {
                    current.push(ch);
                }
            }
            _ => {
                if depth >= 1 {
                    current.push(ch);
                }
            }
        }
    }

    rows
}

/// Split one row body on commas outside string literals
///
/// Unescaped quotes are dropped here; `clean_value` handles the escapes.
fn split_values(row: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escape = false;

    for ch in row.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => {
                current.push(ch);
                escape = true;
            }
            '\'' => in_string = !in_string,
            ',' if !in_string => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() || !values.is_empty() {
        values.push(current.trim().to_string());
    }

    values
}

/// NULL and escape cleanup for string columns
fn clean_value(value: &str) -> String {
    if value.is_empty() || value == "NULL" {
        return String::new();
    }
    value
        .trim_matches('\'')
        .replace("\\'", "'")
        .replace("\\\"", "\"")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\\\", "\\")
}

fn get_i64(values: &[String], index: usize) -> i64 {
    values
        .get(index)
        .and_then(|v| clean_value(v).parse().ok())
        .unwrap_or(0)
}

fn get_f64(values: &[String], index: usize) -> f64 {
    values
        .get(index)
        .and_then(|v| clean_value(v).parse().ok())
        .unwrap_or(0.0)
}

fn get_str(values: &[String], index: usize) -> String {
    values.get(index).map(|v| clean_value(v)).unwrap_or_default()
}

/// Column positions of the wp_wpl_properties dump
fn record_from_values(values: &[String]) -> LegacyPropertyRecord {
    LegacyPropertyRecord {
        id: get_i64(values, 0),
        kind: get_i64(values, 1),
        deleted: get_i64(values, 2),
        mls_id: get_str(values, 3),
        pic_numb: get_i64(values, 6),
        listing: get_i64(values, 8),
        property_type: get_i64(values, 9),
        location1_name: get_str(values, 17),
        location2_name: get_str(values, 18),
        location3_name: get_str(values, 19),
        location4_name: get_str(values, 20),
        price: get_f64(values, 25),
        price_unit: get_i64(values, 26),
        bedrooms: get_f64(values, 29),
        bathrooms: get_f64(values, 31),
        living_area: get_f64(values, 32),
        living_area_unit: get_i64(values, 33),
        lot_area: get_f64(values, 35),
        lot_area_unit: get_i64(values, 36),
        add_date: get_str(values, 42),
        street: get_str(values, 63),
        page_title: get_str(values, 64),
        listing_title: get_str(values, 65),
        description_html: get_str(values, 66),
    }
}
