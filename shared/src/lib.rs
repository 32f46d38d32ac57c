// Domain models and formatting helpers shared by the engine and its front-ends.
pub mod models;
pub mod utils;
