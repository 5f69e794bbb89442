use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;

use crate::index_file::{ClubIndex, INDEX_FILE, NO_IMAGES_FILE};
use crate::mapper::{DETAIL_FIELDS, LISTING_FIELDS, map_record};
use crate::reconcile::missing_records;
use crate::record::CanonicalRecord;
use crate::region::Region;
use crate::source::ClubApi;
use crate::store::ClubStore;
use crate::writer::BatchWriter;

/// Where a run got to. `Failed` is terminal and only reachable from
/// `Fetching`, when every region's bulk listing call failed; per-item
/// failures never move a run here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Fetching,
    Mapping,
    Reconciling,
    Writing,
    Done,
    Failed,
}

#[derive(Debug, Default)]
pub struct FetchStats {
    pub fetched: usize,
    pub per_region: Vec<(Region, usize)>,
    pub regions_failed: usize,
    pub enriched: usize,
    pub absent_details: usize,
    pub with_website: usize,
    pub with_email: usize,
    pub with_image: usize,
}

#[derive(Debug, Default)]
pub struct LoadStats {
    pub processed: usize,
    pub skipped_existing: usize,
    pub written: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Produced once per run, whatever happened along the way.
#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: RunState,
    pub fetch: Option<FetchStats>,
    pub load: Option<LoadStats>,
}

impl RunSummary {
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {:?} in {:.1}s", self.state, self.elapsed_secs())?;
        if let Some(fetch) = &self.fetch {
            write!(f, "; fetched {} clubs", fetch.fetched)?;
            let regions = fetch
                .per_region
                .iter()
                .map(|(region, count)| format!("{region} {count}"))
                .collect::<Vec<_>>()
                .join(", ");
            if !regions.is_empty() {
                write!(f, " ({regions})")?;
            }
            if fetch.regions_failed > 0 {
                write!(f, ", {} region(s) failed", fetch.regions_failed)?;
            }
            if fetch.enriched + fetch.absent_details > 0 {
                write!(
                    f,
                    ", enriched {}, details absent {}",
                    fetch.enriched, fetch.absent_details
                )?;
            }
        }
        if let Some(load) = &self.load {
            write!(
                f,
                "; processed {}, skipped {}, written {} in {} batch(es), {} failed",
                load.processed,
                load.skipped_existing,
                load.written,
                load.batches,
                load.failed_batches
            )?;
        }
        Ok(())
    }
}

/// Orchestrates one run: fetch the full record set, map it, reconcile
/// against the destination, write the gap in batches. Each stage completes
/// before the next begins; nothing here runs concurrently.
pub struct Pipeline {
    api: ClubApi,
    batch_size: usize,
    data_dir: PathBuf,
}

impl Pipeline {
    pub fn new(api: ClubApi, batch_size: usize, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api,
            batch_size,
            data_dir: data_dir.into(),
        }
    }

    fn advance(state: &mut RunState, next: RunState) {
        debug!("run state: {state:?} -> {next:?}");
        *state = next;
    }

    /// Fetch every region's listing and map it, optionally enriching each
    /// club with its detail record. Err only when no region produced a
    /// listing at all; a single dead region just contributes zero records.
    pub async fn fetch(&self, detailed: bool) -> anyhow::Result<(ClubIndex, RunSummary)> {
        let started_at = Utc::now();
        let mut state = RunState::Idle;
        let mut stats = FetchStats::default();

        Self::advance(&mut state, RunState::Fetching);
        let mut listings: Vec<(Region, Vec<Value>)> = Vec::new();
        for region in Region::ALL {
            match self.api.fetch_listing(region).await {
                Ok(raw_clubs) => {
                    info!("fetched {} clubs from {region}", raw_clubs.len());
                    stats.per_region.push((region, raw_clubs.len()));
                    listings.push((region, raw_clubs));
                }
                Err(e) => {
                    warn!("{region} contributes no records this run: {e:#}");
                    stats.regions_failed += 1;
                }
            }
        }
        if stats.regions_failed == Region::ALL.len() {
            Self::advance(&mut state, RunState::Failed);
            let summary = RunSummary {
                started_at,
                finished_at: Utc::now(),
                state,
                fetch: Some(stats),
                load: None,
            };
            warn!("{summary}");
            anyhow::bail!("every region's bulk listing call failed");
        }

        Self::advance(&mut state, RunState::Mapping);
        let mut clubs = Vec::new();
        for (region, raw_clubs) in listings {
            for raw in &raw_clubs {
                let mut record = map_record(raw, LISTING_FIELDS);
                record.insert("region", Value::String(region.as_str().to_string()));
                if detailed {
                    if let Some(id) = record.id() {
                        match self.api.fetch_detail(region, id).await {
                            Some(detail) => {
                                record.merge(map_record(&detail, DETAIL_FIELDS));
                                stats.enriched += 1;
                            }
                            None => stats.absent_details += 1,
                        }
                    }
                }
                clubs.push(record);
            }
        }
        stats.fetched = clubs.len();
        if detailed {
            stats.with_website = clubs.iter().filter(|c| c.contains("website")).count();
            stats.with_email = clubs.iter().filter(|c| c.contains("email")).count();
            stats.with_image = clubs.iter().filter(|c| c.contains("image")).count();
        }

        Self::advance(&mut state, RunState::Done);
        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            state,
            fetch: Some(stats),
            load: None,
        };
        Ok((ClubIndex::new(clubs, detailed), summary))
    }

    /// Reconcile `clubs` against the store and write what's missing in
    /// batches. Never fails: a store that can't even be read degrades to
    /// the empty key set, and the summary is always produced.
    pub async fn load<S: ClubStore + ?Sized>(
        &self,
        clubs: Vec<CanonicalRecord>,
        store: &S,
        enrich_missing: bool,
    ) -> RunSummary {
        let started_at = Utc::now();
        let mut state = RunState::Idle;
        let mut stats = LoadStats {
            processed: clubs.len(),
            ..LoadStats::default()
        };

        Self::advance(&mut state, RunState::Reconciling);
        let existing = match store.existing_ids().await {
            Ok(ids) => {
                info!("{} clubs already present in the store", ids.len());
                ids
            }
            Err(e) => {
                // Write everything and lean on the store's insert-if-absent
                // semantics instead.
                warn!("could not read existing club ids, assuming none: {e:#}");
                HashSet::new()
            }
        };
        let mut missing = missing_records(clubs, &existing);
        stats.skipped_existing = stats.processed - missing.len();
        info!(
            "{} clubs to write, {} already present or unkeyed",
            missing.len(),
            stats.skipped_existing
        );

        if enrich_missing {
            for record in &mut missing {
                let Some(id) = record.id() else { continue };
                let Some(region) = record
                    .get_str("region")
                    .and_then(|r| r.parse::<Region>().ok())
                else {
                    continue;
                };
                if let Some(detail) = self.api.fetch_detail(region, id).await {
                    record.merge(map_record(&detail, DETAIL_FIELDS));
                }
            }
        }

        Self::advance(&mut state, RunState::Writing);
        let writer = BatchWriter::new(self.batch_size, &self.data_dir);
        let results = writer.write_all(&missing, store).await;
        stats.batches = results.len();
        for result in results {
            if result.succeeded() {
                stats.written += result.size;
            } else {
                stats.failed_batches += 1;
                if let Some(path) = result.artifact {
                    stats.artifacts.push(path);
                }
            }
        }

        Self::advance(&mut state, RunState::Done);
        RunSummary {
            started_at,
            finished_at: Utc::now(),
            state,
            fetch: None,
            load: Some(stats),
        }
    }

    /// The whole pipeline in one call: fetch, write the index artifacts,
    /// reconcile, batch-write. Err only when the fetch stage had no data.
    pub async fn run<S: ClubStore + ?Sized>(
        &self,
        store: &S,
        detailed: bool,
    ) -> anyhow::Result<RunSummary> {
        let (index, fetch_summary) = self.fetch(detailed).await?;
        index.save(&self.data_dir.join(INDEX_FILE))?;
        index.strip_images().save(&self.data_dir.join(NO_IMAGES_FILE))?;
        let load_summary = self.load(index.clubs, store, false).await;
        Ok(RunSummary {
            started_at: fetch_summary.started_at,
            finished_at: Utc::now(),
            state: load_summary.state,
            fetch: fetch_summary.fetch,
            load: load_summary.load,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::MemoryStore;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn dead_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        server
    }

    /// England serves two clubs; detail exists for one of them only.
    async fn england_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-admin/admin-ajax.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clubs": [
                    {"id": 102383, "name": "Alnmouth Golf Club", "postcode": "NE66 3BE"},
                    {"id": 7, "name": "Seven Oaks", "postcode": "AB1 2CD"},
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/clubs/GetClubDetailsEg"))
            .and(query_param("clubId", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Website": "https://sevenoaks.golf",
                "NoOfHoles": 18,
            })))
            .mount(&server)
            .await;
        // Club 102383's detail call dies; its listing record must survive.
        Mock::given(method("GET"))
            .and(path("/api/clubs/GetClubDetailsEg"))
            .and(query_param("clubId", "102383"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        server
    }

    async fn pipeline_against(
        england: &MockServer,
        others: &MockServer,
        batch_size: usize,
        data_dir: &std::path::Path,
    ) -> Pipeline {
        let mut api = ClubApi::unthrottled().unwrap();
        api.set_base_url(Region::England, england.uri());
        api.set_base_url(Region::Scotland, others.uri());
        api.set_base_url(Region::Wales, others.uri());
        Pipeline::new(api, batch_size, data_dir)
    }

    #[tokio::test]
    async fn full_run_writes_base_records_even_when_enrichment_is_absent() {
        let england = england_server().await;
        let others = dead_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_against(&england, &others, 25, dir.path()).await;
        let store = MemoryStore::default();

        let summary = pipeline.run(&store, true).await.unwrap();

        assert_eq!(summary.state, RunState::Done);
        let fetch = summary.fetch.as_ref().unwrap();
        assert_eq!(fetch.fetched, 2);
        assert_eq!(fetch.regions_failed, 2);
        assert_eq!(fetch.enriched, 1);
        assert_eq!(fetch.absent_details, 1);
        let load = summary.load.as_ref().unwrap();
        assert_eq!(load.written, 2);
        assert_eq!(load.failed_batches, 0);

        // The timed-out club keeps its listing fields, enrichment absent.
        let clubs = store.clubs.lock().unwrap();
        let alnmouth = clubs.iter().find(|c| c.id() == Some(102383)).unwrap();
        assert_eq!(alnmouth.get_str("name"), Some("Alnmouth Golf Club"));
        assert_eq!(alnmouth.get_str("region"), Some("england"));
        assert!(!alnmouth.contains("website"));
        let enriched = clubs.iter().find(|c| c.id() == Some(7)).unwrap();
        assert_eq!(enriched.get_str("website"), Some("https://sevenoaks.golf"));
        drop(clubs);

        // Both index artifacts landed next to the batch artifacts.
        assert!(dir.path().join(INDEX_FILE).exists());
        assert!(dir.path().join(NO_IMAGES_FILE).exists());
    }

    #[tokio::test]
    async fn second_run_against_unchanged_provider_writes_nothing() {
        let england = england_server().await;
        let others = dead_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_against(&england, &others, 25, dir.path()).await;
        let store = MemoryStore::default();

        let first = pipeline.run(&store, false).await.unwrap();
        assert_eq!(first.load.as_ref().unwrap().written, 2);

        let second = pipeline.run(&store, false).await.unwrap();
        let load = second.load.as_ref().unwrap();
        assert_eq!(load.written, 0);
        assert_eq!(load.skipped_existing, 2);
        assert_eq!(store.ids().len(), 2);
    }

    #[tokio::test]
    async fn all_regions_down_is_a_failed_run() {
        let others = dead_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_against(&others, &others, 25, dir.path()).await;
        assert!(pipeline.fetch(false).await.is_err());
    }

    #[tokio::test]
    async fn unreadable_store_falls_back_to_writing_everything() {
        let england = england_server().await;
        let others = dead_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_against(&england, &others, 25, dir.path()).await;
        let store = MemoryStore {
            fail_existing_read: true,
            ..MemoryStore::default()
        };

        let summary = pipeline.run(&store, false).await.unwrap();

        // Everything is submitted; the store's own idempotency is the net.
        let load = summary.load.as_ref().unwrap();
        assert_eq!(load.written, 2);
        assert_eq!(load.skipped_existing, 0);
        assert_eq!(store.ids().len(), 2);
    }

    #[tokio::test]
    async fn import_missing_enriches_the_gap_on_the_way_in() {
        let england = england_server().await;
        let others = dead_server().await;
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_against(&england, &others, 25, dir.path()).await;
        let store = MemoryStore::default();

        let mut club = CanonicalRecord::new();
        club.insert("id", json!(7));
        club.insert("name", json!("Seven Oaks"));
        club.insert("region", json!("england"));

        let summary = pipeline.load(vec![club], &store, true).await;
        assert_eq!(summary.load.as_ref().unwrap().written, 1);

        let clubs = store.clubs.lock().unwrap();
        assert_eq!(clubs[0].get_str("website"), Some("https://sevenoaks.golf"));
        assert_eq!(clubs[0].get("holes"), Some(&json!(18)));
    }
}
