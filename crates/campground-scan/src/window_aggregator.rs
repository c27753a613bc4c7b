use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::availability::{AvailabilityMap, DatedAvailability};
use crate::fetcher::PageFetcher;
use crate::page_walker::walk_calendar;
use crate::reservation_site::{PAGE_SPAN_DAYS, ReservationSite};
use crate::scan_types::ScanError;

/// First day of every calendar page needed to cover `[start, finish)`.
///
/// Pages are 14 days apart starting at `start`; a new page is only added while
/// the previous one leaves more than 14 days before `finish`, because each page
/// already renders 14 days forward from its own first day.
pub fn sub_window_starts(start: NaiveDate, finish: NaiveDate) -> Vec<NaiveDate> {
    let span = Duration::days(PAGE_SPAN_DAYS);
    let mut starts = vec![start];
    let mut last = start;

    while finish - last > span {
        last += span;
        starts.push(last);
    }

    starts
}

/// Scrape every sub-window of `[start, finish)` for one facility, merge the
/// results and keep only dates inside the window.
///
/// Any page failure fails the whole facility; retries are the fetcher's job.
pub async fn scrape_facility_window<P: PageFetcher + ?Sized>(
    fetcher: &mut P,
    site: &ReservationSite,
    facility_id: u64,
    start: NaiveDate,
    finish: NaiveDate,
) -> Result<DatedAvailability, ScanError> {
    let starts = sub_window_starts(start, finish);
    debug!(
        "Scraping facility {} from {} to {} in {} windows",
        facility_id,
        start,
        finish,
        starts.len()
    );

    let mut availability = AvailabilityMap::new();
    for first_day in starts {
        let window = walk_calendar(fetcher, site, facility_id, first_day).await?;
        availability.merge(window);
    }

    availability.retain_window(start, finish);

    info!(
        "Facility {} has availability on {} days",
        facility_id,
        availability.dates().count()
    );

    Ok(availability.into_dated())
}
