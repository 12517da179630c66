pub mod answer_cache;
pub mod content_ingest;
pub mod scheduler;

pub use answer_cache::AnswerCache;
pub use content_ingest::ContentIngest;
pub use scheduler::{DelayRange, SubmissionScheduler, SubmitMode};
