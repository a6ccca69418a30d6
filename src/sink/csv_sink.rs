use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::{SinkError, SinkResult};
use crate::engine::types::TopOfBook;
use crate::telemetry;

pub const HEADER: [&str; 7] = ["ts_iso", "provider", "symbol", "bid", "ask", "spread", "mid"];

/// One CSV sample. Absent prices are written as empty fields.
#[derive(Debug, Serialize)]
pub struct TopOfBookRow<'a> {
    pub ts_iso: String,
    pub provider: &'a str,
    pub symbol: &'a str,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub spread: Option<f64>,
    pub mid: Option<f64>,
}

impl<'a> TopOfBookRow<'a> {
    pub fn new(ts_iso: String, provider: &'a str, symbol: &'a str, top: &TopOfBook) -> Self {
        Self {
            ts_iso,
            provider,
            symbol,
            bid: top.best_bid,
            ask: top.best_ask,
            spread: top.spread,
            mid: top.mid,
        }
    }
}

pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl CsvSink<File> {
    /// Truncate `path` and write the header.
    pub fn create(path: &Path) -> SinkResult<Self> {
        let file = File::create(path).map_err(|source| SinkError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_writer(file)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> SinkResult<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(HEADER)?;
        writer.flush().map_err(csv::Error::from)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append and flush one row, so a tailing reader always sees whole lines.
    pub fn write_row(&mut self, row: &TopOfBookRow<'_>) -> SinkResult<()> {
        self.writer.serialize(row)?;
        self.writer.flush().map_err(csv::Error::from)?;
        self.rows += 1;
        metrics::counter!(telemetry::CSV_ROWS_WRITTEN).increment(1);
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(sink: &CsvSink<Vec<u8>>) -> String {
        String::from_utf8(sink.get_ref().clone()).unwrap()
    }

    #[test]
    fn test_header_written_up_front() {
        let sink = CsvSink::from_writer(Vec::new()).unwrap();
        assert_eq!(contents(&sink), "ts_iso,provider,symbol,bid,ask,spread,mid\n");
        assert_eq!(sink.rows(), 0);
    }

    #[test]
    fn test_row_with_absent_values() {
        let mut sink = CsvSink::from_writer(Vec::new()).unwrap();
        let top = TopOfBook {
            best_bid: Some(100.0),
            ..TopOfBook::default()
        };
        let ts = "2024-01-01T00:00:00+00:00".to_string();
        sink.write_row(&TopOfBookRow::new(ts, "kraken", "XBTUSD", &top)).unwrap();

        let text = contents(&sink);
        let last = text.lines().last().unwrap();
        assert_eq!(last, "2024-01-01T00:00:00+00:00,kraken,XBTUSD,100.0,,,");
        assert_eq!(sink.rows(), 1);
    }

    #[test]
    fn test_create_truncates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tob.csv");
        std::fs::write(&path, "stale contents\n").unwrap();

        let mut sink = CsvSink::create(&path).unwrap();
        let top = TopOfBook {
            best_bid: Some(1.0),
            best_ask: Some(3.0),
            spread: Some(2.0),
            mid: Some(2.0),
        };
        sink.write_row(&TopOfBookRow::new("t".to_string(), "coinbase", "BTC-USD", &top))
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "ts_iso,provider,symbol,bid,ask,spread,mid\nt,coinbase,BTC-USD,1.0,3.0,2.0,2.0\n"
        );
    }
}
