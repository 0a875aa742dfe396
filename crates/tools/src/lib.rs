//! Collaborator implementations for DeepSearch.
//!
//! These give the research loop its view of the web:
//! - [`SerperSearch`] runs Google searches through the Serper.dev API
//! - [`PageScraper`] fetches pages and turns them into readable text
//!
//! Neither ever fails outward. Problems are logged and handed back as
//! degraded results so the loop can carry on.

pub mod scrape;
pub mod serper;

pub use scrape::PageScraper;
pub use serper::SerperSearch;
