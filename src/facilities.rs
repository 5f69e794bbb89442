use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use log::{info, warn};
use serde_json::Value;

use crate::source::ClubApi;
use crate::store::ClubStore;

/// One row of the facility taxonomy reference table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityTypeRow {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub facility_group_id: i64,
    pub facility_group_name: String,
}

/// One club-to-facility junction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubFacilityRow {
    pub club_id: i64,
    pub facility_type_id: i64,
    pub facility_name: String,
    pub quantity: i64,
    pub is_available: bool,
    pub icon: String,
    pub facility_type_group_id: i64,
}

#[derive(Debug, Default)]
pub struct FacilityImportSummary {
    pub facility_types: usize,
    pub clubs_processed: usize,
    pub clubs_with_facilities: usize,
    pub rows_written: usize,
    pub failed_batches: usize,
}

impl fmt::Display for FacilityImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "facility import: {} types, {}/{} clubs had facilities, {} rows written, {} failed batches",
            self.facility_types,
            self.clubs_with_facilities,
            self.clubs_processed,
            self.rows_written,
            self.failed_batches
        )
    }
}

/// Flatten the taxonomy payload (`FacilityTypes` plus `FacilityTypeGroups`)
/// into reference-table rows, resolving each type's group name.
pub fn parse_taxonomy(body: &Value) -> Vec<FacilityTypeRow> {
    let groups: HashMap<i64, String> = body
        .get("FacilityTypeGroups")
        .and_then(Value::as_array)
        .map(|groups| {
            groups
                .iter()
                .filter_map(|group| {
                    Some((
                        group.get("FacilityTypeGroupId")?.as_i64()?,
                        group.get("FacilityTypeGroupName")?.as_str()?.to_string(),
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    body.get("FacilityTypes")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(|facility| {
                    let group_id = facility
                        .get("FacilityTypeGroupId")
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    Some(FacilityTypeRow {
                        id: facility.get("FacilityTypeId")?.as_i64()?,
                        name: facility.get("TypeName")?.as_str()?.to_string(),
                        icon: facility
                            .get("Icon")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        facility_group_id: group_id,
                        facility_group_name: groups.get(&group_id).cloned().unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Junction rows for one club. Entries without a type name are noise in the
/// provider data and are skipped.
pub fn parse_club_facilities(club_id: i64, facilities: &[Value]) -> Vec<ClubFacilityRow> {
    facilities
        .iter()
        .filter_map(|facility| {
            let name = facility
                .get("TypeName")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if name.is_empty() {
                return None;
            }
            Some(ClubFacilityRow {
                club_id,
                facility_type_id: facility
                    .get("FacilityTypeId")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
                facility_name: name.to_string(),
                quantity: facility.get("Quantity").and_then(Value::as_i64).unwrap_or(0),
                is_available: facility
                    .get("IsAvailable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                icon: facility
                    .get("Icon")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                facility_type_group_id: facility
                    .get("FacilityTypeGroupId")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            })
        })
        .collect()
}

pub struct FacilityImporter<'a> {
    api: &'a ClubApi,
    batch_size: usize,
}

impl<'a> FacilityImporter<'a> {
    pub fn new(api: &'a ClubApi, batch_size: usize) -> Self {
        Self {
            api,
            batch_size: batch_size.max(1),
        }
    }

    /// Populate the facility_types reference table, then walk every club in
    /// the store and insert its available facilities. A failed batch is
    /// logged and skipped; later batches still go through.
    pub async fn import<S: ClubStore + ?Sized>(&self, store: &S) -> Result<FacilityImportSummary> {
        let mut summary = FacilityImportSummary::default();

        let taxonomy = self.api.fetch_facility_taxonomy().await?;
        let types = parse_taxonomy(&taxonomy);
        store
            .insert_facility_types(&types)
            .await
            .context("populating facility_types reference table")?;
        summary.facility_types = types.len();
        info!("populated {} facility types", types.len());

        let clubs = store
            .club_regions()
            .await
            .context("reading club ids from the store")?;
        info!("checking facilities for {} clubs", clubs.len());

        let mut pending: Vec<ClubFacilityRow> = Vec::new();
        for (club_id, region) in clubs {
            summary.clubs_processed += 1;
            // Many clubs simply have no facility data; skip them silently.
            let Some(facilities) = self.api.fetch_facilities(region, club_id).await else {
                continue;
            };
            let rows = parse_club_facilities(club_id, &facilities);
            if rows.is_empty() {
                continue;
            }
            summary.clubs_with_facilities += 1;
            pending.extend(rows);
            while pending.len() >= self.batch_size {
                let batch: Vec<_> = pending.drain(..self.batch_size).collect();
                self.flush(store, &batch, &mut summary).await;
            }
        }
        if !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            self.flush(store, &batch, &mut summary).await;
        }
        Ok(summary)
    }

    async fn flush<S: ClubStore + ?Sized>(
        &self,
        store: &S,
        batch: &[ClubFacilityRow],
        summary: &mut FacilityImportSummary,
    ) {
        match store.insert_club_facilities(batch).await {
            Ok(()) => summary.rows_written += batch.len(),
            Err(e) => {
                warn!("facility batch of {} rows failed: {e:#}", batch.len());
                summary.failed_batches += 1;
            }
        }
    }
}
