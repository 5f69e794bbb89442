use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::Row;

use crate::facilities::{ClubFacilityRow, FacilityTypeRow};
use crate::record::CanonicalRecord;
use crate::region::Region;

/// Capability boundary for the destination store: read back what exists,
/// write what doesn't. All writes are insert-if-absent at the row level so
/// repeated runs are safe even when the caller over-selects.
#[async_trait]
pub trait ClubStore {
    /// Primary keys already present, read once at the start of a run.
    async fn existing_ids(&self) -> Result<HashSet<i64>>;

    /// One batch, one transaction. Duplicate keys are no-ops.
    async fn insert_clubs(&self, batch: &[CanonicalRecord]) -> Result<()>;

    /// Every stored club id with its region, for the facility import pass.
    async fn club_regions(&self) -> Result<Vec<(i64, Region)>>;

    async fn insert_facility_types(&self, rows: &[FacilityTypeRow]) -> Result<()>;

    async fn insert_club_facilities(&self, rows: &[ClubFacilityRow]) -> Result<()>;
}

const TEXT_COLUMNS: &[&str] = &[
    "name",
    "region",
    "address",
    "full_address",
    "town",
    "county",
    "postcode",
    "phone",
    "website",
    "email",
    "image",
    "description",
    "amenities",
    "head_pro_name",
    "head_pro_email",
    "pro_shop_phone",
    "manager_name",
    "tee_booking_url",
    "membership_url",
    "facebook_url",
    "twitter_url",
    "instagram_url",
    "facility_types",
];

const INT_COLUMNS: &[&str] = &[
    "holes",
    "founding_year",
    "total_members",
    "total_men",
    "total_women",
    "adult_men",
    "adult_women",
    "junior_men",
    "junior_women",
];

const REAL_COLUMNS: &[&str] = &["latitude", "longitude"];

fn insert_club_sql() -> String {
    let mut columns: Vec<&str> = vec!["id"];
    columns.extend_from_slice(TEXT_COLUMNS);
    columns.extend_from_slice(INT_COLUMNS);
    columns.extend_from_slice(REAL_COLUMNS);
    let placeholders = (1..=columns.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO clubs ({}) VALUES ({}) ON CONFLICT (id) DO NOTHING",
        columns.join(", "),
        placeholders
    )
}

// The providers are loose with types: counts arrive as strings, coordinates
// as either numbers or strings. Coerce rather than reject.
fn text_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn int_value(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn real_value(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

const SCHEMA_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS clubs (
        id BIGINT PRIMARY KEY,
        name TEXT,
        region TEXT,
        address TEXT,
        full_address TEXT,
        town TEXT,
        county TEXT,
        postcode TEXT,
        phone TEXT,
        website TEXT,
        email TEXT,
        image TEXT,
        description TEXT,
        amenities TEXT,
        head_pro_name TEXT,
        head_pro_email TEXT,
        pro_shop_phone TEXT,
        manager_name TEXT,
        tee_booking_url TEXT,
        membership_url TEXT,
        facebook_url TEXT,
        twitter_url TEXT,
        instagram_url TEXT,
        facility_types TEXT,
        holes BIGINT,
        founding_year BIGINT,
        total_members BIGINT,
        total_men BIGINT,
        total_women BIGINT,
        adult_men BIGINT,
        adult_women BIGINT,
        junior_men BIGINT,
        junior_women BIGINT,
        latitude DOUBLE PRECISION,
        longitude DOUBLE PRECISION
    )",
    "CREATE TABLE IF NOT EXISTS facility_types (
        id BIGINT PRIMARY KEY,
        name TEXT NOT NULL,
        icon TEXT,
        facility_group_id BIGINT,
        facility_group_name TEXT
    )",
    "CREATE TABLE IF NOT EXISTS club_facilities (
        club_id BIGINT NOT NULL,
        facility_type_id BIGINT NOT NULL,
        facility_name TEXT NOT NULL,
        quantity BIGINT,
        is_available BOOLEAN,
        icon TEXT,
        facility_type_group_id BIGINT,
        PRIMARY KEY (club_id, facility_type_id)
    )",
];

/// Postgres-backed store. Parameterized statements throughout; nothing in
/// this module interpolates record values into SQL text.
pub struct PgClubStore {
    pool: PgPool,
}

impl PgClubStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .context("connecting to destination database")?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("creating destination schema")?;
        }
        Ok(())
    }
}

#[async_trait]
impl ClubStore for PgClubStore {
    async fn existing_ids(&self) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM clubs")
            .fetch_all(&self.pool)
            .await
            .context("reading existing club ids")?;
        Ok(ids.into_iter().collect())
    }

    async fn insert_clubs(&self, batch: &[CanonicalRecord]) -> Result<()> {
        let sql = insert_club_sql();
        let mut tx = self
            .pool
            .begin()
            .await
            .context("starting insert transaction")?;
        for record in batch {
            let mut query = sqlx::query(&sql).bind(record.id());
            for column in TEXT_COLUMNS {
                query = query.bind(text_value(record.get(column)));
            }
            for column in INT_COLUMNS {
                query = query.bind(int_value(record.get(column)));
            }
            for column in REAL_COLUMNS {
                query = query.bind(real_value(record.get(column)));
            }
            query
                .execute(&mut *tx)
                .await
                .with_context(|| format!("inserting club {:?}", record.id()))?;
        }
        tx.commit().await.context("committing insert transaction")?;
        Ok(())
    }

    async fn club_regions(&self) -> Result<Vec<(i64, Region)>> {
        let rows = sqlx::query("SELECT id, region FROM clubs ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("reading club regions")?;
        // Clubs with an unknown region tag can't be facility-fetched; drop them.
        Ok(rows
            .iter()
            .filter_map(|row| {
                let id: i64 = row.try_get("id").ok()?;
                let region: String = row.try_get("region").ok()?;
                Some((id, region.parse::<Region>().ok()?))
            })
            .collect())
    }

    async fn insert_facility_types(&self, rows: &[FacilityTypeRow]) -> Result<()> {
        let sql = "INSERT INTO facility_types \
                   (id, name, icon, facility_group_id, facility_group_name) \
                   VALUES ($1, $2, $3, $4, $5) \
                   ON CONFLICT (id) DO UPDATE SET \
                   name = EXCLUDED.name, icon = EXCLUDED.icon, \
                   facility_group_id = EXCLUDED.facility_group_id, \
                   facility_group_name = EXCLUDED.facility_group_name";
        let mut tx = self
            .pool
            .begin()
            .await
            .context("starting facility-type transaction")?;
        for row in rows {
            sqlx::query(sql)
                .bind(row.id)
                .bind(&row.name)
                .bind(&row.icon)
                .bind(row.facility_group_id)
                .bind(&row.facility_group_name)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("inserting facility type {}", row.id))?;
        }
        tx.commit()
            .await
            .context("committing facility-type transaction")?;
        Ok(())
    }

    async fn insert_club_facilities(&self, rows: &[ClubFacilityRow]) -> Result<()> {
        let sql = "INSERT INTO club_facilities \
                   (club_id, facility_type_id, facility_name, quantity, \
                    is_available, icon, facility_type_group_id) \
                   VALUES ($1, $2, $3, $4, $5, $6, $7) \
                   ON CONFLICT (club_id, facility_type_id) DO NOTHING";
        let mut tx = self
            .pool
            .begin()
            .await
            .context("starting club-facility transaction")?;
        for row in rows {
            sqlx::query(sql)
                .bind(row.club_id)
                .bind(row.facility_type_id)
                .bind(&row.facility_name)
                .bind(row.quantity)
                .bind(row.is_available)
                .bind(&row.icon)
                .bind(row.facility_type_group_id)
                .execute(&mut *tx)
                .await
                .with_context(|| {
                    format!(
                        "inserting facility {} for club {}",
                        row.facility_type_id, row.club_id
                    )
                })?;
        }
        tx.commit()
            .await
            .context("committing club-facility transaction")?;
        Ok(())
    }
}
