//! Web fetch tool; HTML pages are reduced with the element filter

mod fetch;

pub use fetch::WebFetch;
