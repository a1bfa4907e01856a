pub mod error;
pub mod merge;
pub mod payload;

pub use error::{IngestError, Result};
pub use merge::CompletionMerger;
pub use payload::{Completion, CompletionPayload, ErrorBody, ErrorDetail, ParsedCompletion};
