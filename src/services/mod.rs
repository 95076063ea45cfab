//! Clients for external services.

pub mod summary;

pub use summary::{
    summary_or_fallback, OpenAiSummarizer, Summarizer, SummaryError, SUMMARY_FALLBACK,
};
