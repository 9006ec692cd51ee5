use std::io::{Read, Write};

use serde::Serialize;

use crate::errors::{AppError, AppResult};

/// One input record: field names paired with their string values, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }

    /// Overwrites `name` in place, or appends it as a new trailing field.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (key, value) in iter {
            row.set(&key.into(), value);
        }
        row
    }
}

/// A parsed CSV document: the header row plus every data row.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Parses CSV with a required header row. Records whose width differs from
/// the header and repeated header names are rejected.
pub fn read_table<R: Read>(source: R) -> AppResult<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(source);
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    for (idx, name) in headers.iter().enumerate() {
        if headers[..idx].contains(name) {
            return Err(AppError::Config(format!("duplicate column '{name}' in input header")));
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = headers.iter().map(String::as_str).zip(record.iter()).collect();
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

pub fn read_rows<R: Read>(source: R) -> AppResult<Vec<Row>> {
    Ok(read_table(source)?.rows)
}

/// Writes a header row followed by every row. The header starts with
/// `headers` and picks up any other field names in first-seen order; fields a
/// row lacks are written empty.
pub fn write_rows<W: Write>(destination: W, headers: &[String], rows: &[Row]) -> AppResult<()> {
    let mut header: Vec<&str> = headers.iter().map(String::as_str).collect();
    for row in rows {
        for name in row.field_names() {
            if !header.contains(&name) {
                header.push(name);
            }
        }
    }

    let mut writer = csv::WriterBuilder::new().from_writer(destination);
    if header.is_empty() {
        writer.flush()?;
        return Ok(());
    }
    writer.write_record(&header)?;
    for row in rows {
        writer.write_record(header.iter().map(|name| row.get(name).unwrap_or_default()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "name,address,lat\n\
        Office,\"160 Varick St, New York NY\",\n\
        Nowhere,THIS IS NOT AN ADDRESS,40.7\n";

    #[test]
    fn reads_rows_in_column_order() {
        let rows = read_rows(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(
            first.field_names().collect::<Vec<_>>(),
            vec!["name", "address", "lat"]
        );
        assert_eq!(first.get("address"), Some("160 Varick St, New York NY"));
        assert_eq!(first.get("lat"), Some(""));
        assert_eq!(rows[1].get("lat"), Some("40.7"));
    }

    #[test]
    fn set_overwrites_or_appends() {
        let mut row: Row = [("address", "somewhere"), ("lat", "")].into_iter().collect();
        row.set("lat", "1.5");
        row.set("lng", "2.5");
        assert_eq!(row.get("lat"), Some("1.5"));
        assert_eq!(
            row.field_names().collect::<Vec<_>>(),
            vec!["address", "lat", "lng"]
        );
    }

    #[test]
    fn writes_union_header_and_blank_fills() {
        let mut rows = read_rows(SAMPLE_CSV.as_bytes()).unwrap();
        rows[0].set("lng", "-74.0");

        let mut out = Vec::<u8>::new();
        write_rows(&mut out, &[], &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("name,address,lat,lng"));
        assert_eq!(
            lines.next(),
            Some("Office,\"160 Varick St, New York NY\",,-74.0")
        );
        assert_eq!(lines.next(), Some("Nowhere,THIS IS NOT AN ADDRESS,40.7,"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn header_only_input_keeps_header() {
        let table = read_table("address,lat,lng\n".as_bytes()).unwrap();
        assert!(table.rows.is_empty());

        let mut out = Vec::<u8>::new();
        write_rows(&mut out, &table.headers, &table.rows).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "address,lat,lng\n");
    }

    #[test]
    fn rejects_records_wider_than_header() {
        let err = read_rows("address,lat\n1 Main St,40.7,EXTRA DATA\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Csv(_)));
    }

    #[test]
    fn rejects_records_narrower_than_header() {
        let err = read_rows("address,lat,lng\n1 Main St,40.7\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Csv(_)));
    }

    #[test]
    fn rejects_duplicate_header_names() {
        let err = read_rows("address,lat,address\n1 Main St,,2 Main St\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Config(message) if message.contains("'address'")));
    }
}
