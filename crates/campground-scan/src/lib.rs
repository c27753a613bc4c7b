//! # Campground Scan
//!
//! This crate scrapes the reservation calendar of recreation.gov facilities and
//! turns it into a per-date, per-campsite availability count. It also drives the
//! enrichment pass that attaches that availability to stored recreation areas.

/// Error taxonomy and shared settings types
mod scan_types;
pub use scan_types::*;

/// Per-date, per-campsite availability counts
mod availability;
pub use availability::*;

/// Calendar URL template of the reservation site
mod reservation_site;
pub use reservation_site::*;

/// Parsing of a single calendar page
mod page_parser;
pub use page_parser::*;

/// Pagination across one 14-day window
mod page_walker;
pub use page_walker::*;

/// Splitting a date range into page-sized windows
mod window_aggregator;
pub use window_aggregator::*;

/// Fetch capability consumed by the scraper
mod fetcher;
pub use fetcher::*;

/// HTTP sessions against the reservation site
mod session_manager;
pub use session_manager::*;

/// Stored recreation area and facility records
mod rec_area;
pub use rec_area::*;

/// Key-value storage of recreation areas
mod storage;
pub use storage::*;

/// Enrichment pass over the store
mod enrichment;
pub use enrichment::*;
