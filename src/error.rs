use thiserror::Error;

/// Input-shape failures that abort a run. The source workbook changed in a
/// way the fixed sheet geometry cannot handle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("label set {labels:?} is not a usable list of strings")]
    MalformedLabels { labels: Vec<String> },

    #[error("found none of {labels:?} in sheet `{sheet}`")]
    LabelNotFound { sheet: String, labels: Vec<String> },

    #[error("missing date in `{context}`")]
    NullDate { context: String },

    #[error("workbook `{workbook}` has no sheet `{sheet}`")]
    MissingSheet { workbook: String, sheet: String },
}
