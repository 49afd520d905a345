pub mod config;
pub mod error;
pub mod grid;
pub mod history;
pub mod merge;
pub mod parse;
pub mod quarter;
pub mod run;
pub mod table;
pub mod workbook;

pub use config::Config;
pub use error::ExtractError;
pub use run::{run, RunOutcome, RunSummary};
