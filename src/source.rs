use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use log::debug;
use serde_json::Value;

use crate::ratelimit::RateLimiter;
use crate::region::Region;
use crate::requests::RequestClient;

/// Bulk listing calls pull the whole region in one response.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);
/// Per-club detail and facility calls are small and must fail fast.
pub const DETAIL_TIMEOUT: Duration = Duration::from_secs(10);

// The taxonomy endpoint is per-club, so probe it off a known England club.
const TAXONOMY_PROBE_CLUB_ID: i64 = 100000;

/// Record source over the three regional club APIs. Each region gets its
/// own request client, and with it its own rate limiter, so providers are
/// throttled independently.
///
/// Per-item calls never fail past this boundary: a timeout, non-2xx status
/// or malformed payload means "no data for this club" and the run carries
/// on. Only the bulk listing call surfaces an error, because without it a
/// region has nothing to contribute. No retries anywhere — a failed fetch
/// is treated as absent for the rest of the run.
pub struct ClubApi {
    clients: HashMap<Region, RequestClient>,
    bases: HashMap<Region, String>,
}

impl ClubApi {
    pub fn new(min_request_period: Duration) -> anyhow::Result<Self> {
        let mut clients = HashMap::new();
        let mut bases = HashMap::new();
        for region in Region::ALL {
            clients.insert(
                region,
                RequestClient::new(RateLimiter::new(min_request_period))?,
            );
            bases.insert(region, region.default_base_url().to_string());
        }
        Ok(Self { clients, bases })
    }

    /// No rate limiting at all. For tests against a local mock server.
    pub fn unthrottled() -> anyhow::Result<Self> {
        Self::new(Duration::ZERO)
    }

    /// Point one region at a different host, e.g. a mock server.
    pub fn set_base_url(&mut self, region: Region, base: impl Into<String>) {
        self.bases.insert(region, base.into());
    }

    fn base(&self, region: Region) -> &str {
        &self.bases[&region]
    }

    fn client(&self, region: Region) -> &RequestClient {
        &self.clients[&region]
    }

    /// The bulk listing for a region. A failure here is the caller's
    /// problem; there is no per-item fallback for a whole region.
    pub async fn fetch_listing(&self, region: Region) -> anyhow::Result<Vec<Value>> {
        let url = region.listing_url(self.base(region));
        let body = self
            .client(region)
            .fetch_json(&url, LISTING_TIMEOUT)
            .await
            .with_context(|| format!("bulk listing fetch failed for {region}"))?;
        let clubs = body
            .get("clubs")
            .and_then(Value::as_array)
            .cloned()
            .with_context(|| format!("bulk listing for {region} had no `clubs` array"))?;
        Ok(clubs)
    }

    /// The detail record for one club, or `None` when anything at all goes
    /// wrong with the call.
    pub async fn fetch_detail(&self, region: Region, club_id: i64) -> Option<Value> {
        let url = region.detail_url(self.base(region), club_id);
        match self.client(region).fetch_json(&url, DETAIL_TIMEOUT).await {
            Ok(body) if body.is_object() => Some(body),
            Ok(_) => {
                debug!("detail payload for club {club_id} ({region}) was not an object");
                None
            }
            Err(e) => {
                debug!("detail fetch for club {club_id} ({region}) failed: {e:#}");
                None
            }
        }
    }

    /// The facilities a club actually offers. Entries the provider marks
    /// unavailable are filtered out here; clubs without facility data at
    /// all yield `None`.
    pub async fn fetch_facilities(&self, region: Region, club_id: i64) -> Option<Vec<Value>> {
        let url = region.facility_url(self.base(region), club_id);
        let body = match self.client(region).fetch_json(&url, DETAIL_TIMEOUT).await {
            Ok(body) => body,
            Err(e) => {
                debug!("facility fetch for club {club_id} ({region}) failed: {e:#}");
                return None;
            }
        };
        let types = body.get("FacilityTypes")?.as_array()?;
        Some(
            types
                .iter()
                .filter(|facility| {
                    facility
                        .get("IsAvailable")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                })
                .cloned()
                .collect(),
        )
    }

    /// The full facility taxonomy (types plus groups), probed off a known
    /// England club. The reference table cannot be built without it, so
    /// this one is allowed to fail loudly.
    pub async fn fetch_facility_taxonomy(&self) -> anyhow::Result<Value> {
        let region = Region::England;
        let url = region.facility_url(self.base(region), TAXONOMY_PROBE_CLUB_ID);
        self.client(region)
            .fetch_json(&url, LISTING_TIMEOUT)
            .await
            .context("facility taxonomy fetch failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api_against(server: &MockServer, region: Region) -> ClubApi {
        let mut api = ClubApi::unthrottled().unwrap();
        api.set_base_url(region, server.uri());
        api
    }

    #[tokio::test]
    async fn listing_returns_the_clubs_array() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-admin/admin-ajax.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "clubs": [
                    {"id": 1, "name": "One"},
                    {"id": 2, "name": "Two"},
                ]
            })))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::Scotland).await;
        let clubs = api.fetch_listing(Region::Scotland).await.unwrap();
        assert_eq!(clubs.len(), 2);
        assert_eq!(clubs[0]["name"], json!("One"));
    }

    #[tokio::test]
    async fn listing_without_clubs_array_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 0})))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::Wales).await;
        assert!(api.fetch_listing(Region::Wales).await.is_err());
    }

    #[tokio::test]
    async fn listing_http_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::England).await;
        assert!(api.fetch_listing(Region::England).await.is_err());
    }

    #[tokio::test]
    async fn detail_failure_degrades_to_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clubs/GetClubDetails"))
            .and(query_param("clubId", "1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        // Malformed payload: an array where an object is expected.
        Mock::given(method("GET"))
            .and(query_param("clubId", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([1, 2])))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::Scotland).await;
        assert!(api.fetch_detail(Region::Scotland, 1).await.is_none());
        assert!(api.fetch_detail(Region::Scotland, 2).await.is_none());
    }

    #[tokio::test]
    async fn detail_success_returns_the_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clubs/GetClubDetailsEg"))
            .and(query_param("clubId", "102383"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Website": "https://alnmouth.golf",
                "NoOfHoles": 9,
            })))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::England).await;
        let detail = api.fetch_detail(Region::England, 102383).await.unwrap();
        assert_eq!(detail["NoOfHoles"], json!(9));
    }

    #[tokio::test]
    async fn facilities_keep_only_available_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clubs/GetClubFacilityTypes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "FacilityTypes": [
                    {"FacilityTypeId": 1, "TypeName": "Driving Range", "IsAvailable": true},
                    {"FacilityTypeId": 2, "TypeName": "Pro Shop", "IsAvailable": false},
                    {"FacilityTypeId": 3, "TypeName": "Bar"},
                ]
            })))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::Wales).await;
        let facilities = api.fetch_facilities(Region::Wales, 10).await.unwrap();
        assert_eq!(facilities.len(), 1);
        assert_eq!(facilities[0]["TypeName"], json!("Driving Range"));
    }

    #[tokio::test]
    async fn facilities_missing_payload_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Message": "no data"})))
            .mount(&server)
            .await;

        let api = api_against(&server, Region::England).await;
        assert!(api.fetch_facilities(Region::England, 10).await.is_none());
    }
}
