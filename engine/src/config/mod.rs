// Analyzer configuration
pub mod settings;

pub use settings::AnalyzerSettings;
