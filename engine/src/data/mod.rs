// Quote ingestion: provider tables, CSV exports and normalization into bar series.
pub mod csv_parser;
pub mod normalizer;
pub mod raw_table;

pub use normalizer::QuoteNormalizer;
pub use raw_table::{ColumnKey, RawIndex, RawQuoteTable};
