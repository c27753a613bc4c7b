use chrono::NaiveDate;
use tracing::debug;

use crate::availability::AvailabilityMap;
use crate::fetcher::PageFetcher;
use crate::page_parser::parse_calendar_page;
use crate::reservation_site::ReservationSite;
use crate::scan_types::ScanError;

/// Follow the calendar's next-page links for one facility and one 14-day
/// window, merging the availability of every page.
///
/// The walk ends when a page has no next link. Session cookies are cleared
/// afterwards so that reservation holds do not leak into the next window.
pub async fn walk_calendar<P: PageFetcher + ?Sized>(
    fetcher: &mut P,
    site: &ReservationSite,
    facility_id: u64,
    first_day: NaiveDate,
) -> Result<AvailabilityMap, ScanError> {
    let mut url = site.calendar_url(facility_id, first_day);
    let mut availability = AvailabilityMap::new();
    let mut pages = 0usize;

    loop {
        let html = fetcher.fetch(&url).await?;
        let page = parse_calendar_page(&html, first_day, site);
        pages += 1;
        availability.merge(page.availability);

        match page.next_page_url {
            Some(next) => url = next,
            None => break,
        }
    }

    debug!(
        "Walked {} calendar pages for facility {} starting {}",
        pages, facility_id, first_day
    );

    fetcher.clear_session_state().await?;
    Ok(availability)
}
