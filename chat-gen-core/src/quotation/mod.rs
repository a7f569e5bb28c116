//! Quotation corpora and the rarity-first search over them.

/// Quotation records and the immutable corpus loaded from one file.
pub mod corpus;

/// The selectable corpora, loaded once and shared.
pub mod catalog;

/// Rarity-ordered substring search and sentence shortening.
pub mod search;

/// Reply texts built from search results.
pub mod compose;

pub use catalog::{CorpusCatalog, CorpusEntry, CorpusSource};
pub use corpus::{QuotationCorpus, QuotationRecord};
pub use search::{QuotationSearch, SearchResult, SearchStatus};
