use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

/// Campsite name to number of open (available or waitlisted) observations
pub type CampsiteCounts = BTreeMap<String, u32>;

/// Finalized availability keyed by ISO-8601 date strings, as persisted on a facility
pub type DatedAvailability = BTreeMap<String, CampsiteCounts>;

/// Per-date, per-campsite count of open slots seen while scraping a facility
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilityMap {
    dates: BTreeMap<NaiveDate, CampsiteCounts>,
}

impl AvailabilityMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more open observation of `campsite` on `date`
    pub fn record(&mut self, date: NaiveDate, campsite: &str) {
        self.add(date, campsite, 1);
    }

    fn add(&mut self, date: NaiveDate, campsite: &str, count: u32) {
        let counts = self.dates.entry(date).or_default();
        match counts.get_mut(campsite) {
            Some(existing) => *existing += count,
            None => {
                counts.insert(campsite.to_string(), count);
            }
        }
    }

    /// Fold `other` into this map. Counts for the same (date, campsite) add up.
    pub fn merge(&mut self, other: AvailabilityMap) {
        for (date, counts) in other.dates {
            for (campsite, count) in counts {
                self.add(date, &campsite, count);
            }
        }
    }

    /// Drop every date outside `[start, finish)`
    pub fn retain_window(&mut self, start: NaiveDate, finish: NaiveDate) {
        self.dates.retain(|date, _| *date >= start && *date < finish);
    }

    /// Count recorded for `campsite` on `date`, if any
    pub fn count(&self, date: NaiveDate, campsite: &str) -> Option<u32> {
        self.dates.get(&date)?.get(campsite).copied()
    }

    /// Counts recorded on `date`
    pub fn on(&self, date: NaiveDate) -> Option<&CampsiteCounts> {
        self.dates.get(&date)
    }

    /// Dates that have at least one observation, in ascending order
    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.keys()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Re-key by ISO-8601 date string for persistence
    pub fn into_dated(self) -> DatedAvailability {
        self.dates
            .into_iter()
            .map(|(date, counts)| (date.format("%Y-%m-%d").to_string(), counts))
            .collect()
    }
}
