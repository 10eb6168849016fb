//! Lead import from CSV files and pasted text.

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::AppError;
use crate::leads::Lead;

/// Column positions found in a CSV header.
#[derive(Debug, Default, PartialEq, Eq)]
struct HeaderMap {
    first_name: Option<usize>,
    last_name: Option<usize>,
    /// Single full-name column, only used when there is no first-name column.
    full_name: Option<usize>,
    email: Option<usize>,
    phone: Option<usize>,
}

impl HeaderMap {
    fn detect(headers: &StringRecord) -> Self {
        let lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |pred: fn(&str) -> bool| lower.iter().position(|h| pred(h.as_str()));

        let first_name = find(|h| (h.contains("first") && h.contains("name")) || h == "firstname");
        let last_name = find(|h| (h.contains("last") && h.contains("name")) || h == "lastname");
        let full_name = if first_name.is_none() {
            find(|h| h == "name")
        } else {
            None
        };
        let email = find(|h| h.contains("email"));
        let phone = find(|h| h.contains("phone") || h.contains("mobile") || h.contains("number"));

        Self {
            first_name,
            last_name,
            full_name,
            email,
            phone,
        }
    }

    fn names(&self, row: &StringRecord) -> (String, String) {
        let field = |i: Option<usize>| i.and_then(|i| row.get(i)).unwrap_or("").to_string();

        // A first-name column only counts alongside a last-name column
        if self.first_name.is_some() {
            if self.last_name.is_none() {
                return (String::new(), String::new());
            }
            return (field(self.first_name), field(self.last_name));
        }

        let full = field(self.full_name);
        match full.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
            None => (full, String::new()),
        }
    }
}

/// Parses a CSV file with a header row.
///
/// Needs a first-name (or single `name`) column and a phone column; rows
/// without a first name or phone, or shorter than the header, are skipped.
/// A first-name column without a last-name column yields no names, so every
/// row of such a file is skipped.
///
/// # Errors
///
/// `AppError::CsvInvalid` when the header lacks the required columns, the
/// data is not valid CSV, or no row yields a lead.
pub fn parse_csv(text: &str) -> Result<Vec<Lead>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.trim().as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| AppError::CsvInvalid(format!("unreadable header: {}", e)))?
        .clone();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(AppError::CsvInvalid(
            "needs a header and at least one row".into(),
        ));
    }

    let columns = HeaderMap::detect(&headers);
    if (columns.first_name.is_none() && columns.full_name.is_none()) || columns.phone.is_none() {
        return Err(AppError::CsvInvalid(
            "a name (or first/last name) and a phone column are required".into(),
        ));
    }

    let mut leads = Vec::new();
    for record in reader.records() {
        let row = record.map_err(|e| AppError::CsvInvalid(format!("unreadable row: {}", e)))?;
        if row.len() < headers.len() {
            continue;
        }

        let (first_name, last_name) = columns.names(&row);
        let phone = columns.phone.and_then(|i| row.get(i)).unwrap_or("");
        let email = columns.email.and_then(|i| row.get(i)).map(str::to_string);

        if !first_name.is_empty() && !phone.is_empty() {
            leads.push(Lead::new(first_name, last_name, email, phone));
        }
    }

    if leads.is_empty() {
        return Err(AppError::CsvInvalid("no valid leads found".into()));
    }
    Ok(leads)
}

/// Parses pasted `first,last,email,phone` lines.
///
/// A first line mentioning `first`, `name` or `email` is taken as a header.
/// Lines need a first name, last name and phone.
pub fn parse_pasted(text: &str) -> Result<Vec<Lead>, AppError> {
    let text = text.trim();
    let body = match text.split_once('\n') {
        Some((first, rest)) if looks_like_header(first) => rest,
        None if looks_like_header(text) => "",
        _ => text,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let mut leads = Vec::new();
    for record in reader.records() {
        let row = record.map_err(|e| AppError::CsvInvalid(format!("unreadable line: {}", e)))?;
        let field = |i: usize| row.get(i).unwrap_or("");

        let (first, last, email, phone) = (field(0), field(1), field(2), field(3));
        if !first.is_empty() && !last.is_empty() && !phone.is_empty() {
            leads.push(Lead::new(first, last, Some(email.to_string()), phone));
        }
    }

    if leads.is_empty() {
        return Err(AppError::CsvInvalid("no valid leads found".into()));
    }
    Ok(leads)
}

fn looks_like_header(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("first") || lower.contains("name") || lower.contains("email")
}
