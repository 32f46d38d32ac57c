use shared::models::{Period, SeriesError};
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Input contains no rows")]
    EmptyInput,

    #[error("Series is too short to evaluate any indicator")]
    InsufficientData,

    #[error("Baseline price is zero; percent change is undefined")]
    DivisionByZero,

    #[error("Exchange rate must be a positive number, got {0}")]
    InvalidRate(f64),

    #[error("Indicator window must be a positive integer")]
    InvalidIndicatorWindow,

    #[error("Unknown indicator: {0}")]
    UnknownIndicator(String),

    #[error("Unrecognized quote table schema: {0}")]
    UnrecognizedSchema(String),

    #[error("Quote table is missing the '{0}' column")]
    MissingColumn(&'static str),

    #[error("Quote timestamps go backwards at row {position}")]
    UnorderedIndex { position: usize },

    #[error(transparent)]
    Series(#[from] SeriesError),

    #[error("No data for symbol '{symbol}' and period {period}")]
    NoData { symbol: String, period: Period },

    #[error("Fetch gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("CSV parsing system error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },

    // Catch-all for helpers that report through anyhow.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AnalysisError {
    /// True for every condition the presentation layer shows as "no data".
    pub fn is_no_data(&self) -> bool {
        matches!(self, AnalysisError::NoData { .. } | AnalysisError::EmptyInput)
    }

    /// One-line text meant for the end user rather than the logs.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::NoData { .. } | AnalysisError::EmptyInput => {
                "No data found. Make sure the ticker symbol is correct.".to_string()
            }
            AnalysisError::InvalidIndicatorWindow | AnalysisError::UnknownIndicator(_) => {
                format!("Invalid indicator selection: {}", self)
            }
            AnalysisError::UnrecognizedSchema(_)
            | AnalysisError::MissingColumn(_)
            | AnalysisError::UnorderedIndex { .. }
            | AnalysisError::Series(_) => {
                format!("The data provider returned malformed quotes: {}", self)
            }
            AnalysisError::Gateway(err) => format!("Data provider unavailable: {}", err),
            other => format!("Analysis failed: {}", other),
        }
    }
}

pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
