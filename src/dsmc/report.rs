//! Parsers for the human-oriented reports `dsmc query ...` prints.

use crate::archive::backend::{ArchivedCopy, Filespace};

/// "No files matching search criteria were found".
pub const NO_MATCHING_FILES: &str = "ANS1092W";
/// "No file spaces found".
pub const NO_FILESPACES: &str = "ANS1083";

const SIZE_UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Rows(Vec<T>),
    /// The client said explicitly that nothing matched.
    Empty,
    /// No table and no recognised "empty" message.
    Unrecognised,
}

fn mentions(stdout: &str, stderr: &str, code: &str) -> bool {
    stdout.contains(code) || stderr.contains(code)
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '-' || c.is_whitespace())
}

/// Lines after the first dash-only separator, blank lines dropped.
fn table_rows(stdout: &str) -> Option<Vec<&str>> {
    let mut lines = stdout.lines();
    lines.by_ref().find(|line| is_separator(line))?;
    Some(lines.filter(|line| !line.trim().is_empty()).collect())
}

/// Split off the first whitespace-delimited token.
fn next_token(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.split_once(char::is_whitespace) {
        Some((token, rest)) => Some((token, rest)),
        None => Some((input, "")),
    }
}

fn parse_filespace_row(line: &str) -> Option<Filespace> {
    let (number, rest) = next_token(line)?;
    let number = number.parse::<u32>().ok()?;
    let (_date, rest) = next_token(rest)?;
    let (_time, rest) = next_token(rest)?;
    let (fs_type, rest) = next_token(rest)?;
    let name = rest.trim();
    if name.is_empty() {
        return None;
    }
    Some(Filespace {
        number,
        fs_type: fs_type.to_string(),
        name: name.to_string(),
    })
}

pub fn parse_filespaces(stdout: &str, stderr: &str) -> Parsed<Filespace> {
    if mentions(stdout, stderr, NO_FILESPACES) {
        return Parsed::Empty;
    }
    let Some(rows) = table_rows(stdout) else {
        return Parsed::Unrecognised;
    };
    Parsed::Rows(rows.into_iter().filter_map(parse_filespace_row).collect())
}

/// Byte offset of `name` in `line` where it stands as a whole field.
fn find_field(line: &str, name: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = line[from..].find(name) {
        let start = from + offset;
        let end = start + name.len();
        let before_ok = line[..start].chars().next_back().is_none_or(char::is_whitespace);
        let after_ok = line[end..].chars().next().is_none_or(char::is_whitespace);
        if before_ok && after_ok {
            return Some(start);
        }
        from = start + name.chars().next().map_or(1, char::len_utf8);
    }
    None
}

fn parse_archive_row(line: &str, object: &str) -> Option<ArchivedCopy> {
    let start = find_field(line, object)?;
    let before = line[..start].split_whitespace().collect::<Vec<_>>();
    let after = line[start + object.len()..].trim();

    let (size, archived_at) = match before.as_slice() {
        [size @ .., date, time] if !size.is_empty() => {
            (Some(size.join(" ")), Some(format!("{date} {time}")))
        }
        [size, unit] if SIZE_UNITS.contains(unit) => (Some(format!("{size} {unit}")), None),
        [] => (None, None),
        other => (Some(other.join(" ")), None),
    };

    Some(ArchivedCopy {
        object: object.to_string(),
        size,
        archived_at,
        description: (!after.is_empty()).then(|| after.to_string()),
    })
}

/// Rows of a `query archive` report whose file field is exactly `object`.
pub fn parse_archive_copies(stdout: &str, stderr: &str, object: &str) -> Parsed<ArchivedCopy> {
    if mentions(stdout, stderr, NO_MATCHING_FILES) {
        return Parsed::Empty;
    }
    let Some(rows) = table_rows(stdout) else {
        return Parsed::Unrecognised;
    };
    Parsed::Rows(
        rows.into_iter()
            .filter_map(|line| parse_archive_row(line, object))
            .collect(),
    )
}
