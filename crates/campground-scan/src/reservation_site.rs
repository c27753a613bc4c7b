use chrono::{Datelike, NaiveDate};

/// Number of day columns rendered on one calendar page
pub const PAGE_SPAN_DAYS: i64 = 14;

/// Root of the legacy recreation.gov reservation site
pub const DEFAULT_SITE_ROOT: &str = "http://www.recreation.gov";

/// URL layout of the server-rendered campsite calendar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationSite {
    root: String,
}

impl Default for ReservationSite {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_ROOT)
    }
}

impl ReservationSite {
    /// Create a site description rooted at `root` (scheme and host, no trailing slash)
    pub fn new(root: impl Into<String>) -> Self {
        let root: String = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// Site root used to resolve relative links
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Calendar matrix page for `facility_id` whose first column is `date`
    pub fn calendar_url(&self, facility_id: u64, date: NaiveDate) -> String {
        format!(
            "{}/campsiteCalendar.do?page=matrix&calarvdate={}&contractCode=NRSO&parkId={}",
            self.root,
            calendar_date(date),
            facility_id
        )
    }

    /// Turn a next-page href scraped from a calendar page into a fetchable URL
    pub fn resolve(&self, href: &str) -> String {
        let href = href.replace("&amp;", "&");
        if href.starts_with("http://") || href.starts_with("https://") {
            href
        } else if href.starts_with('/') {
            format!("{}{}", self.root, href)
        } else {
            format!("{}/{}", self.root, href)
        }
    }
}

/// Date in the `M/D/YYYY` form the calendar expects
pub fn calendar_date(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.month(), date.day(), date.year())
}
