//! Inbound news: discovering articles and pulling their text.
//!
//! Like every news source this follows a two-phase pattern:
//!
//! 1. **Indexing**: [`newsapi`] asks the news search API for the latest
//!    article references
//! 2. **Fetching**: [`article`] downloads each page and extracts the body text
//!
//! | Module | Method | Notes |
//! |--------|--------|-------|
//! | [`newsapi`] | JSON search API | Requires an API key; at most 10 results |
//! | [`article`] | HTML scraping | Selector priority list, paragraph fallback |

pub mod article;
pub mod newsapi;
