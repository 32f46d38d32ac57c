// Engine library root
pub mod analysis;
pub mod config;
pub mod currency;
pub mod data;
pub mod error;
pub mod gateway;
pub mod indicators;
pub mod metrics;
pub mod watchlist;

pub use analysis::{Analysis, AnalysisRequest, AnalysisService};
pub use error::{AnalysisError, Result};
