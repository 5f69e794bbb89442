mod config;
mod ratelimit;
mod requests;

mod facilities;
mod index_file;
mod mapper;
mod pipeline;
mod reconcile;
mod record;
mod region;
mod source;
mod store;
mod writer;

pub use config::{AppConfig, LoadFromEnv};
pub use facilities::{ClubFacilityRow, FacilityImportSummary, FacilityImporter, FacilityTypeRow};
pub use index_file::{ClubIndex, INDEX_FILE, NO_IMAGES_FILE};
pub use mapper::{DETAIL_FIELDS, LISTING_FIELDS, map_record};
pub use pipeline::{FetchStats, LoadStats, Pipeline, RunState, RunSummary};
pub use ratelimit::RateLimiter;
pub use reconcile::missing_records;
pub use record::CanonicalRecord;
pub use region::Region;
pub use requests::RequestClient;
pub use source::ClubApi;
pub use store::{ClubStore, PgClubStore};
pub use writer::{BatchResult, BatchWriter};
