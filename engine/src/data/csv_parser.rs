use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::raw_table::{ColumnKey, RawIndex, RawQuoteTable};

// Cell-level parsing for the Yahoo-style CSV export.
pub mod quote_format {
    use anyhow::{anyhow, Result};
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};

    /// A parsed index cell; intraday exports carry an offset, daily ones do not.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub enum ParsedTimestamp {
        Naive(NaiveDateTime),
        Zoned(DateTime<FixedOffset>),
    }

    const ZONED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    pub fn parse_timestamp(s: &str) -> Result<ParsedTimestamp> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(ParsedTimestamp::Zoned(dt));
        }
        for format in ZONED_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, format) {
                return Ok(ParsedTimestamp::Zoned(dt));
            }
        }
        for format in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                return Ok(ParsedTimestamp::Naive(dt));
            }
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(ParsedTimestamp::Naive)
            .ok_or_else(|| anyhow!("Failed to parse timestamp '{}'", s))
    }

    /// Empty cells and `NaN` mean "no value"; anything else must be a number.
    pub fn parse_value(s: &str) -> Result<Option<f64>> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
            return Ok(None);
        }
        s.parse::<f64>()
            .map(Some)
            .map_err(|e| anyhow!("Failed to parse number '{}': {}", s, e))
    }

}

use quote_format::ParsedTimestamp;

/// Reader for the CSV layout produced by Yahoo Finance downloads.
///
/// Single-symbol exports have one header row (`Date,Open,High,...`). Multi-level exports
/// have a field row (`Price,Close,High,...`), a `Ticker` row and an index-name row
/// (`Date,,,,`) before the data.
pub struct YahooCsvParser;

impl YahooCsvParser {
    pub fn load_table_from_csv(file_path: &Path) -> Result<RawQuoteTable> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open CSV file '{}'", file_path.display()))?;
        Self::parse_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse CSV file '{}'", file_path.display()))
    }

    pub fn parse_reader<R: Read>(reader: R) -> Result<RawQuoteTable> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = rdr.records().enumerate().peekable();

        let fields = match records.next() {
            Some((_, record)) => record?,
            None => return Ok(RawQuoteTable::empty()),
        };
        let column_count = fields.len().saturating_sub(1);
        if column_count == 0 {
            bail!("CSV header has no value columns");
        }

        // Extra header rows: `Ticker,...` gives the second label level, `Date,,,` is noise.
        let mut tickers: Option<StringRecord> = None;
        while let Some((_, Ok(record))) = records.peek() {
            let first = record.get(0).unwrap_or("");
            if quote_format::parse_timestamp(first).is_ok() {
                break;
            }
            if first.eq_ignore_ascii_case("ticker") {
                tickers = Some(record.clone());
            } else if !Self::is_index_name_row(record) {
                bail!("Unexpected header row starting with '{}'", first);
            }
            records.next();
        }

        let columns: Vec<ColumnKey> = (1..=column_count)
            .map(|c| {
                let field = fields.get(c).unwrap_or("");
                match &tickers {
                    Some(t) => ColumnKey::nested([field, t.get(c).unwrap_or("")]),
                    None => ColumnKey::flat(field),
                }
            })
            .collect();

        let mut naive = Vec::new();
        let mut zoned = Vec::new();
        let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); column_count];

        for (idx, result) in records {
            let line = idx + 1;
            let record = result.map_err(|e| anyhow!("Error reading CSV record at line {}: {}", line, e))?;
            let stamp = Self::get_cell(&record, 0, line)?;
            match quote_format::parse_timestamp(stamp)
                .map_err(|e| anyhow!("Error parsing index at line {}: {}", line, e))?
            {
                ParsedTimestamp::Naive(dt) => naive.push(dt),
                ParsedTimestamp::Zoned(dt) => zoned.push(dt),
            }
            for (c, column) in values.iter_mut().enumerate() {
                let cell = record.get(c + 1).unwrap_or("");
                let value = quote_format::parse_value(cell)
                    .map_err(|e| anyhow!("Error parsing column {} at line {}: {}", c + 1, line, e))?;
                column.push(value);
            }
        }

        let index = Self::build_index(naive, zoned)?;
        Ok(RawQuoteTable::new(index, columns, values))
    }

    fn build_index(naive: Vec<NaiveDateTime>, zoned: Vec<DateTime<FixedOffset>>) -> Result<RawIndex> {
        match (naive.is_empty(), zoned.is_empty()) {
            (_, true) => Ok(RawIndex::Naive(naive)),
            (true, false) => Ok(RawIndex::Zoned(zoned)),
            (false, false) => Err(anyhow!(
                "Index mixes timestamps with and without a UTC offset ({} naive, {} zoned)",
                naive.len(),
                zoned.len()
            )),
        }
    }

    fn is_index_name_row(record: &StringRecord) -> bool {
        let first = record.get(0).unwrap_or("");
        let named = first.eq_ignore_ascii_case("date") || first.eq_ignore_ascii_case("datetime");
        named && record.iter().skip(1).all(str::is_empty)
    }

    fn get_cell<'a>(record: &'a StringRecord, pos: usize, line: usize) -> Result<&'a str> {
        record
            .get(pos)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Missing index value in CSV record at line {}", line))
    }
}
