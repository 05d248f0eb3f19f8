/*

SPDX-License-Identifier: AGPL-3.0-only
Copyright (c) 2025 Augustus Rizza

*/

//! Parsers for the compact argument strings the CLI accepts:
//!
//!   lists        `RIC,PeriodEndDate`
//!   year ranges  `2000..2022` (inclusive), `2001`, `2000..2003,2010`
//!   tie-breaks   `AnnDate` / `AnnDate:asc` / `AnnDate:desc` / `gap:AnnDate:PeriodEndDate`

use std::ops::RangeInclusive;

use crate::cleaner::TieBreak;
use crate::error::{DataError, Result};

fn invalid(msg: String) -> DataError {
    DataError::InvalidArgument(msg)
}

/// "a,b,c" → ["a","b","c"], trimming empties.
pub fn parse_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|x| x.trim())
        .filter(|x| !x.is_empty())
        .map(|x| x.to_string())
        .collect()
}

/// Split "<start>..<end>" into owned Strings.
pub fn parse_range(v: &str) -> Result<(String, String)> {
    v.split_once("..")
        .map(|(a, b)| (a.trim().to_string(), b.trim().to_string()))
        .ok_or_else(|| invalid(format!("invalid range `{v}` (expected start..end)")))
}

fn parse_year(s: &str) -> Result<i32> {
    s.parse::<i32>()
        .map_err(|_| invalid(format!("invalid year: `{s}`")))
}

pub fn parse_year_range(v: &str) -> Result<RangeInclusive<i32>> {
    let v = v.trim();
    if !v.contains("..") {
        let y = parse_year(v)?;
        return Ok(y..=y);
    }
    let (a, b) = parse_range(v)?;
    let (start, end) = (parse_year(&a)?, parse_year(&b)?);
    if start > end {
        return Err(invalid(format!("year range `{v}` runs backwards")));
    }
    Ok(start..=end)
}

/// Comma separated years and ranges, sorted and deduplicated.
pub fn parse_years(v: &str) -> Result<Vec<i32>> {
    let mut years = Vec::new();
    for part in parse_list(v) {
        years.extend(parse_year_range(&part)?);
    }
    if years.is_empty() {
        return Err(invalid("no years given".into()));
    }
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

pub fn parse_tie_break(v: &str) -> Result<TieBreak> {
    let parts: Vec<&str> = v.split(':').map(str::trim).collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok(TieBreak::asc(*name)),
        [name, dir] if !name.is_empty() => match dir.to_ascii_lowercase().as_str() {
            "asc" => Ok(TieBreak::asc(*name)),
            "desc" => Ok(TieBreak::desc(*name)),
            other => Err(invalid(format!(
                "unknown sort direction `{other}` in `{v}` (expected asc or desc)"
            ))),
        },
        ["gap", left, right] if !left.is_empty() && !right.is_empty() => {
            Ok(TieBreak::date_gap(*left, *right))
        }
        _ => Err(invalid(format!(
            "invalid tie-break `{v}` (expected col, col:asc, col:desc or gap:left:right)"
        ))),
    }
}
