use chrono::{Days, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::availability::AvailabilityMap;
use crate::reservation_site::{PAGE_SPAN_DAYS, ReservationSite};

/// Banner the site renders instead of a calendar when it is having trouble
pub const APOLOGY_MARKER: &str = "Our apologies. We are experiencing some difficulties.";

lazy_static! {
    /// One campsite row: its loop name, then everything up to the row separator
    static ref CAMPSITE_ROW: Regex = Regex::new(
        r#"(?s)<div title=".*?class="loopName">(.*?)</div></td>\s*(.*?)<tr class="separator">"#
    )
    .unwrap();

    /// First character of each day cell's status class
    static ref DAY_STATUS: Regex = Regex::new(r#"<td class="status ([^"\s])"#).unwrap();

    static ref NEXT_PAGE: Regex = Regex::new(r#"<a id="resultNext" href="(\S+)">"#).unwrap();
}

/// Status of one campsite on one day, as encoded in the calendar cell class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayStatus {
    /// Bookable now
    Available,
    /// Open for the waitlist
    Waitlist,
    /// Booked, closed, walk-up only, not yet released, ...
    Other(char),
}

impl From<char> for DayStatus {
    fn from(code: char) -> Self {
        match code {
            'a' => DayStatus::Available,
            'w' => DayStatus::Waitlist,
            other => DayStatus::Other(other),
        }
    }
}

impl DayStatus {
    /// Whether this status counts as an open slot
    pub fn is_open(self) -> bool {
        matches!(self, DayStatus::Available | DayStatus::Waitlist)
    }
}

/// Outcome of scraping one calendar page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Absolute URL of the following page, if the page links to one
    pub next_page_url: Option<String>,

    /// Open slots found on this page
    pub availability: AvailabilityMap,
}

/// Parse one calendar page whose leftmost day column is `first_day`.
///
/// An apology page yields an empty result with no next page so that
/// pagination ends cleanly instead of erroring.
pub fn parse_calendar_page(html: &str, first_day: NaiveDate, site: &ReservationSite) -> PageResult {
    if html.contains(APOLOGY_MARKER) {
        debug!("Apology page for calendar starting {}", first_day);
        return PageResult::default();
    }

    let mut availability = AvailabilityMap::new();

    for row in CAMPSITE_ROW.captures_iter(html) {
        let campsite = row[1].trim();
        let statuses = DAY_STATUS
            .captures_iter(&row[2])
            .filter_map(|cell| cell[1].chars().next())
            .take(PAGE_SPAN_DAYS as usize);

        for (offset, code) in statuses.enumerate() {
            if !DayStatus::from(code).is_open() {
                continue;
            }
            if let Some(date) = first_day.checked_add_days(Days::new(offset as u64)) {
                availability.record(date, campsite);
            }
        }
    }

    let next_page_url = NEXT_PAGE
        .captures(html)
        .map(|link| site.resolve(&link[1]));

    PageResult {
        next_page_url,
        availability,
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{booked, page, row};
    use super::*;

    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_parse_day_status() {
        assert_eq!(DayStatus::from('a'), DayStatus::Available);
        assert_eq!(DayStatus::from('w'), DayStatus::Waitlist);
        assert_eq!(DayStatus::from('r'), DayStatus::Other('r'));
        assert!(DayStatus::Available.is_open());
        assert!(DayStatus::Waitlist.is_open());
        assert!(!DayStatus::Other('x').is_open());
    }

    #[test]
    fn test_only_open_codes_are_counted() {
        let mut codes = vec!['a', 'b', 'x', 'a'];
        codes.extend(std::iter::repeat_n('r', 10));
        let html = page(
            &[row("Site A", &codes)],
            Some("/campsiteCalendar.do?page=matrix&amp;startIdx=25"),
        );

        let result = parse_calendar_page(&html, june(1), &ReservationSite::default());

        let dates: Vec<&NaiveDate> = result.availability.dates().collect();
        assert_eq!(dates, vec![&june(1), &june(4)]);
        assert_eq!(result.availability.count(june(1), "Site A"), Some(1));
        assert_eq!(result.availability.count(june(4), "Site A"), Some(1));
        assert_eq!(result.availability.count(june(2), "Site A"), None);
        assert_eq!(
            result.next_page_url.as_deref(),
            Some("http://www.recreation.gov/campsiteCalendar.do?page=matrix&startIdx=25")
        );
    }

    #[test]
    fn test_waitlist_counts_as_open() {
        let mut codes = booked();
        codes[6] = 'w';
        let html = page(&[row("Loop B 012", &codes)], None);

        let result = parse_calendar_page(&html, june(1), &ReservationSite::default());

        assert_eq!(result.availability.count(june(7), "Loop B 012"), Some(1));
        assert_eq!(result.availability.dates().count(), 1);
        assert!(result.next_page_url.is_none());
    }

    #[test]
    fn test_repeated_row_accumulates() {
        let codes = vec!['a'; 14];
        let html = page(&[row("Site A", &codes), row("Site A", &codes)], None);

        let result = parse_calendar_page(&html, june(1), &ReservationSite::default());

        assert_eq!(result.availability.count(june(1), "Site A"), Some(2));
        assert_eq!(result.availability.count(june(14), "Site A"), Some(2));
        assert_eq!(result.availability.dates().count(), 14);
    }

    #[test]
    fn test_short_row_is_tolerated() {
        let html = page(&[row("Site C", &['r', 'a', 'a'])], None);

        let result = parse_calendar_page(&html, june(28), &ReservationSite::default());

        assert_eq!(result.availability.count(june(29), "Site C"), Some(1));
        assert_eq!(result.availability.count(june(30), "Site C"), Some(1));
        assert_eq!(result.availability.dates().count(), 2);
    }

    #[test]
    fn test_extra_cells_beyond_page_span_are_ignored() {
        let html = page(&[row("Site D", &['a'; 16])], None);

        let result = parse_calendar_page(&html, june(1), &ReservationSite::default());

        assert_eq!(result.availability.dates().count(), 14);
        assert_eq!(result.availability.count(june(15), "Site D"), None);
    }

    #[test]
    fn test_apology_page_short_circuits() {
        let mut html = page(
            &[row("Site A", &['a'; 14])],
            Some("/campsiteCalendar.do?page=matrix&amp;startIdx=25"),
        );
        html.push_str(&format!("<p>{}</p>", APOLOGY_MARKER));

        let result = parse_calendar_page(&html, june(1), &ReservationSite::default());

        assert!(result.availability.is_empty());
        assert!(result.next_page_url.is_none());
    }

    #[test]
    fn test_page_without_rows() {
        let result = parse_calendar_page(
            "<html><body>No campsites</body></html>",
            june(1),
            &ReservationSite::default(),
        );

        assert_eq!(result, PageResult::default());
    }
}
