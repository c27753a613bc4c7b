use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::availability::DatedAvailability;
use crate::fetcher::{PageFetcher, SessionFactory, acquire_with_retry};
use crate::rec_area::{Facility, RecArea};
use crate::reservation_site::ReservationSite;
use crate::scan_types::{FailureIsolation, ScanError};
use crate::storage::RecAreaStore;
use crate::window_aggregator::scrape_facility_window;

/// Settings for one enrichment pass
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Recreation areas processed at the same time (default: 72)
    pub pool_size: usize,

    /// Whether a failing facility abandons its whole area (default) or only itself
    pub isolation: FailureIsolation,

    /// When set, a plain-text note is written here for every facility with availability
    pub notes_dir: Option<PathBuf>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            pool_size: 72,
            isolation: FailureIsolation::RecArea,
            notes_dir: None,
        }
    }
}

/// Counts reported at the end of a pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    /// Keys listed in the store
    pub records_seen: usize,
    /// Areas written back
    pub rec_areas_enriched: usize,
    /// Areas abandoned because of an error
    pub rec_areas_failed: usize,
    /// Facilities that failed inside areas that were still written
    pub facilities_failed: usize,
    /// Records that were missing, unparsable or had no identifier
    pub skipped_malformed: usize,
    /// Records without a facilities list
    pub skipped_without_facilities: usize,
}

enum RecAreaOutcome {
    Written { facilities_failed: usize },
    Failed,
}

/// Attaches reservation availability to every stored recreation area
pub struct Enricher<S, F> {
    store: Arc<S>,
    sessions: Arc<F>,
    site: ReservationSite,
    config: EnrichmentConfig,
}

impl<S, F> Enricher<S, F>
where
    S: RecAreaStore + 'static,
    F: SessionFactory + 'static,
{
    /// Create an enricher over `store`, scraping `site` with sessions from `sessions`
    pub fn new(
        store: Arc<S>,
        sessions: Arc<F>,
        site: ReservationSite,
        config: Option<EnrichmentConfig>,
    ) -> Self {
        Self {
            store,
            sessions,
            site,
            config: config.unwrap_or_default(),
        }
    }

    /// Run one pass over every record in the store for `[start, finish)`.
    ///
    /// Only a failure to list the store's keys aborts the pass; every
    /// per-record problem is logged and counted in the summary.
    pub async fn run(
        &self,
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Result<EnrichmentSummary, ScanError> {
        let keys = self.store.list_keys().await?;
        let mut summary = EnrichmentSummary {
            records_seen: keys.len(),
            ..EnrichmentSummary::default()
        };

        info!(
            "Enriching {} stored records for {} to {}",
            keys.len(),
            start,
            finish
        );

        let mut pending = Vec::new();
        for key in keys {
            match self.load(&key).await {
                Ok(Some(rec_area)) => pending.push(rec_area),
                Ok(None) => {
                    debug!("Record {} has no facilities, skipping", key);
                    summary.skipped_without_facilities += 1;
                }
                Err(e) => {
                    warn!("Skipping record: {}", e);
                    summary.skipped_malformed += 1;
                }
            }
        }

        let permits = Arc::new(Semaphore::new(self.config.pool_size.max(1)));
        let mut workers = JoinSet::new();

        for rec_area in pending {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ScanError::ConfigError(format!("Worker pool closed: {}", e)))?;
            let worker = self.clone_for_task();

            workers.spawn(async move {
                let outcome = worker.process_rec_area(rec_area, start, finish).await;
                drop(permit);
                outcome
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(RecAreaOutcome::Written { facilities_failed }) => {
                    summary.rec_areas_enriched += 1;
                    summary.facilities_failed += facilities_failed;
                }
                Ok(RecAreaOutcome::Failed) => summary.rec_areas_failed += 1,
                Err(e) => {
                    error!("Enrichment worker stopped unexpectedly: {}", e);
                    summary.rec_areas_failed += 1;
                }
            }
        }

        info!(
            "Enrichment pass finished: {} written, {} failed, {} malformed, {} without facilities",
            summary.rec_areas_enriched,
            summary.rec_areas_failed,
            summary.skipped_malformed,
            summary.skipped_without_facilities
        );

        Ok(summary)
    }

    /// Read and decode one record. `Ok(None)` means there is nothing to enrich.
    async fn load(&self, key: &str) -> Result<Option<RecArea>, ScanError> {
        let malformed = |message: String| ScanError::MalformedRecord {
            key: key.to_string(),
            message,
        };

        let raw = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| malformed("no value stored".to_string()))?;

        let rec_area: RecArea =
            serde_json::from_str(&raw).map_err(|e| malformed(format!("invalid JSON: {}", e)))?;

        if rec_area.key().is_none() {
            return Err(malformed("missing RecAreaID".to_string()));
        }

        if rec_area.facilities.is_none() {
            return Ok(None);
        }

        Ok(Some(rec_area))
    }

    async fn process_rec_area(
        &self,
        mut rec_area: RecArea,
        start: NaiveDate,
        finish: NaiveDate,
    ) -> RecAreaOutcome {
        let id = rec_area.key().unwrap_or_default();

        let facilities_failed = match self.enrich_rec_area(&mut rec_area, start, finish).await {
            Ok(failed) => failed,
            Err(e) => {
                error!("Recarea {}: {}", id, e);
                return RecAreaOutcome::Failed;
            }
        };

        if let Err(e) = self.save(&id, &rec_area).await {
            error!("Recarea {}: {}", id, e);
            return RecAreaOutcome::Failed;
        }

        debug!("Stored enriched recarea {}", id);
        RecAreaOutcome::Written { facilities_failed }
    }

    /// Enrich every scrapeable facility of `rec_area` in order. Returns how many
    /// facilities failed when failures are isolated per facility.
    pub async fn enrich_rec_area(
        &self,
        rec_area: &mut RecArea,
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Result<usize, ScanError> {
        let area_id = rec_area.key().unwrap_or_default();
        let area_name = rec_area.display_name().to_string();
        let mut failed = 0;

        for facility in rec_area.facilities.iter_mut().flatten() {
            let Some(legacy_id) = facility.legacy_id() else {
                continue;
            };

            match self
                .enrich_facility(&area_name, facility, legacy_id, start, finish)
                .await
            {
                Ok(()) => {}
                Err(e) if self.config.isolation == FailureIsolation::Facility => {
                    error!("Recarea {}: facility {}: {}", area_id, legacy_id, e);
                    failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(failed)
    }

    async fn enrich_facility(
        &self,
        area_name: &str,
        facility: &mut Facility,
        legacy_id: u64,
        start: NaiveDate,
        finish: NaiveDate,
    ) -> Result<(), ScanError> {
        facility.reservation_url = Some(self.site.calendar_url(legacy_id, start));
        facility.reservation = None;

        let policy = self.sessions.retry_policy();
        let mut session = acquire_with_retry(self.sessions.as_ref(), &policy, legacy_id).await?;

        let scraped =
            scrape_facility_window(&mut session, &self.site, legacy_id, start, finish).await;

        if let Err(e) = session.release().await {
            warn!("Failed to release session for facility {}: {}", legacy_id, e);
        }

        let availability = scraped?;
        if availability.is_empty() {
            return Ok(());
        }

        let facility_name = facility.name.as_deref().unwrap_or("<unnamed>");
        let serialized = serde_json::to_string(&availability)?;
        info!("{}: {} {}", area_name, facility_name, serialized);
        self.write_note(legacy_id, area_name, facility_name, &availability)
            .await;

        facility.reservation = Some(availability);
        Ok(())
    }

    async fn write_note(
        &self,
        legacy_id: u64,
        area_name: &str,
        facility_name: &str,
        availability: &DatedAvailability,
    ) {
        let Some(dir) = &self.config.notes_dir else {
            return;
        };

        let body = format!("{}: {}\n{:?}\n", area_name, facility_name, availability);
        let path = dir.join(legacy_id.to_string());
        if let Err(e) = tokio::fs::write(&path, body).await {
            warn!("Failed to write note {}: {}", path.display(), e);
        }
    }

    async fn save(&self, key: &str, rec_area: &RecArea) -> Result<(), ScanError> {
        let json = serde_json::to_string(rec_area)?;
        self.store.set(key, json).await
    }

    /// Create a clone suitable for background tasks
    fn clone_for_task(&self) -> Self {
        Self {
            store: self.store.clone(),
            sessions: self.sessions.clone(),
            site: self.site.clone(),
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    use serde_json::Value;

    use super::*;
    use crate::fetcher::testing::ScriptedFactory;
    use crate::page_parser::fixtures::{booked, page, row};
    use crate::storage::MemoryStore;

    fn june(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn open_on(days: &[usize]) -> Vec<char> {
        let mut codes = booked();
        for d in days {
            codes[*d] = 'a';
        }
        codes
    }

    fn enricher(
        store: Arc<MemoryStore>,
        factory: Arc<ScriptedFactory>,
        isolation: FailureIsolation,
    ) -> Enricher<MemoryStore, ScriptedFactory> {
        Enricher::new(
            store,
            factory,
            ReservationSite::default(),
            Some(EnrichmentConfig {
                pool_size: 4,
                isolation,
                notes_dir: None,
            }),
        )
    }

    async fn stored(store: &MemoryStore, key: &str) -> Value {
        serde_json::from_str(&store.get(key).await.unwrap().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_facility_without_legacy_id_is_not_fetched() {
        let store = Arc::new(MemoryStore::with_entries([(
            "10",
            r#"{"RecAreaID": 10, "RecAreaName": "Lake", "facilities": [
                {"FacilityName": "Boat Ramp", "LegacyFacilityID": ""},
                {"FacilityName": "Dock"}
            ]}"#,
        )]));
        let factory = Arc::new(ScriptedFactory::new(HashMap::new()));

        let summary = enricher(store.clone(), factory.clone(), FailureIsolation::RecArea)
            .run(june(1), june(10))
            .await
            .unwrap();

        assert_eq!(summary.rec_areas_enriched, 1);
        assert_eq!(factory.log.acquired.load(Ordering::SeqCst), 0);
        assert!(factory.fetched().await.is_empty());
        let written = stored(&store, "10").await;
        assert!(written["facilities"][0].get("reservation_url").is_none());
    }

    #[tokio::test]
    async fn test_enriches_and_writes_back() {
        let site = ReservationSite::default();
        let mut pages = HashMap::new();
        pages.insert(
            site.calendar_url(70925, june(1)),
            page(&[row("Site A", &open_on(&[0, 3]))], None),
        );
        pages.insert(
            site.calendar_url(70926, june(1)),
            page(&[row("Site Z", &booked())], None),
        );
        let store = Arc::new(MemoryStore::with_entries([(
            "2991",
            r#"{"RecAreaID": "2991", "RecAreaName": "Yosemite", "weather": {"high": 81},
                "facilities": [
                    {"FacilityName": "Upper Pines", "LegacyFacilityID": "70925"},
                    {"FacilityName": "Lower Pines", "LegacyFacilityID": "70926",
                     "reservation": {"2023-01-01": {"Old": 1}}}
                ]}"#,
        )]));
        let factory = Arc::new(ScriptedFactory::new(pages));

        let summary = enricher(store.clone(), factory.clone(), FailureIsolation::RecArea)
            .run(june(1), june(10))
            .await
            .unwrap();

        assert_eq!(summary.rec_areas_enriched, 1);
        assert_eq!(summary.rec_areas_failed, 0);
        let written = stored(&store, "2991").await;
        let upper = &written["facilities"][0];
        assert_eq!(upper["reservation"]["2024-06-01"]["Site A"], 1);
        assert_eq!(upper["reservation"]["2024-06-04"]["Site A"], 1);
        assert_eq!(
            upper["reservation_url"],
            site.calendar_url(70925, june(1)).as_str()
        );
        let lower = &written["facilities"][1];
        assert!(lower.get("reservation").is_none());
        assert!(lower.get("reservation_url").is_some());
        assert_eq!(written["weather"]["high"], 81);
        assert_eq!(factory.log.acquired.load(Ordering::SeqCst), 2);
        assert_eq!(factory.log.released.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_records_are_skipped() {
        let store = Arc::new(MemoryStore::with_entries([
            ("1", "not json"),
            ("2", r#"{"RecAreaName": "No id", "facilities": []}"#),
            ("3", r#"{"RecAreaID": 3, "RecAreaName": "No facilities"}"#),
            ("4", r#"{"RecAreaID": 4, "facilities": []}"#),
        ]));
        let factory = Arc::new(ScriptedFactory::new(HashMap::new()));

        let summary = enricher(store.clone(), factory, FailureIsolation::RecArea)
            .run(june(1), june(10))
            .await
            .unwrap();

        assert_eq!(
            summary,
            EnrichmentSummary {
                records_seen: 4,
                rec_areas_enriched: 1,
                rec_areas_failed: 0,
                facilities_failed: 0,
                skipped_malformed: 2,
                skipped_without_facilities: 1,
            }
        );
        assert_eq!(store.get("1").await.unwrap().as_deref(), Some("not json"));
    }

    fn failing_area_pages(site: &ReservationSite) -> HashMap<String, String> {
        // Facility 1 has no page and fails; 2 and 3 succeed.
        let mut pages = HashMap::new();
        pages.insert(
            site.calendar_url(2, june(1)),
            page(&[row("Site B", &open_on(&[1]))], None),
        );
        pages.insert(
            site.calendar_url(3, june(1)),
            page(&[row("Site C", &open_on(&[2]))], None),
        );
        pages
    }

    const MIXED_AREAS: [(&str, &str); 2] = [
        (
            "100",
            r#"{"RecAreaID": 100, "facilities": [
                {"LegacyFacilityID": 1}, {"LegacyFacilityID": 2}
            ]}"#,
        ),
        ("200", r#"{"RecAreaID": 200, "facilities": [{"LegacyFacilityID": 3}]}"#),
    ];

    #[tokio::test]
    async fn test_failure_abandons_rec_area_only() {
        let site = ReservationSite::default();
        let store = Arc::new(MemoryStore::with_entries(MIXED_AREAS));
        let factory = Arc::new(ScriptedFactory::new(failing_area_pages(&site)));

        let summary = enricher(store.clone(), factory.clone(), FailureIsolation::RecArea)
            .run(june(1), june(10))
            .await
            .unwrap();

        assert_eq!(summary.rec_areas_enriched, 1);
        assert_eq!(summary.rec_areas_failed, 1);
        assert!(!factory
            .fetched()
            .await
            .contains(&site.calendar_url(2, june(1))));
        let untouched = stored(&store, "100").await;
        assert!(untouched["facilities"][0].get("reservation_url").is_none());
        let other = stored(&store, "200").await;
        assert_eq!(other["facilities"][0]["reservation"]["2024-06-03"]["Site C"], 1);
    }

    #[tokio::test]
    async fn test_failure_isolated_per_facility() {
        let site = ReservationSite::default();
        let store = Arc::new(MemoryStore::with_entries(MIXED_AREAS));
        let factory = Arc::new(ScriptedFactory::new(failing_area_pages(&site)));

        let summary = enricher(store.clone(), factory.clone(), FailureIsolation::Facility)
            .run(june(1), june(10))
            .await
            .unwrap();

        assert_eq!(summary.rec_areas_enriched, 2);
        assert_eq!(summary.rec_areas_failed, 0);
        assert_eq!(summary.facilities_failed, 1);
        let area = stored(&store, "100").await;
        assert!(area["facilities"][0].get("reservation").is_none());
        assert_eq!(area["facilities"][1]["reservation"]["2024-06-02"]["Site B"], 1);
        assert_eq!(factory.log.released.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_session_exhaustion_fails_rec_area() {
        let store = Arc::new(MemoryStore::with_entries([(
            "7",
            r#"{"RecAreaID": 7, "facilities": [{"LegacyFacilityID": 70925}]}"#,
        )]));
        let factory = Arc::new(ScriptedFactory::failing(HashMap::new(), 10));

        let summary = enricher(store.clone(), factory.clone(), FailureIsolation::RecArea)
            .run(june(1), june(10))
            .await
            .unwrap();

        assert_eq!(summary.rec_areas_failed, 1);
        assert!(factory.fetched().await.is_empty());
    }

    #[tokio::test]
    async fn test_notes_are_written_for_available_facilities() {
        let site = ReservationSite::default();
        let mut pages = HashMap::new();
        pages.insert(
            site.calendar_url(70925, june(1)),
            page(&[row("Site A", &open_on(&[0]))], None),
        );
        let notes_dir = std::env::temp_dir().join(format!("enrich-notes-{}", std::process::id()));
        std::fs::create_dir_all(&notes_dir).unwrap();
        let store = Arc::new(MemoryStore::with_entries([(
            "1",
            r#"{"RecAreaID": 1, "RecAreaName": "Lake", "facilities": [
                {"FacilityName": "Pines", "LegacyFacilityID": 70925}
            ]}"#,
        )]));
        let enricher = Enricher::new(
            store,
            Arc::new(ScriptedFactory::new(pages)),
            site,
            Some(EnrichmentConfig {
                notes_dir: Some(notes_dir.clone()),
                ..EnrichmentConfig::default()
            }),
        );

        enricher.run(june(1), june(10)).await.unwrap();

        let note = std::fs::read_to_string(notes_dir.join("70925")).unwrap();
        assert!(note.starts_with("Lake: Pines\n"));
        assert!(note.contains("2024-06-01"));
        std::fs::remove_dir_all(&notes_dir).unwrap();
    }
}
