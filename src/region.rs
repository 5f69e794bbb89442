use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the three source jurisdictions. Each has its own API host and, in
/// England's case, its own detail-endpoint handler name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    England,
    Scotland,
    Wales,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::England, Region::Scotland, Region::Wales];

    pub fn default_base_url(self) -> &'static str {
        match self {
            Region::England => "https://www.englandgolf.org",
            Region::Scotland => "https://www.scottishgolf.org",
            Region::Wales => "https://www.walesgolf.org",
        }
    }

    pub fn listing_url(self, base: &str) -> String {
        format!("{base}/wp-admin/admin-ajax.php?action=get_golf_clubs")
    }

    pub fn detail_url(self, base: &str, club_id: i64) -> String {
        match self {
            Region::England => format!("{base}/api/clubs/GetClubDetailsEg?clubId={club_id}"),
            _ => format!("{base}/api/clubs/GetClubDetails?clubId={club_id}"),
        }
    }

    pub fn facility_url(self, base: &str, club_id: i64) -> String {
        format!("{base}/api/clubs/GetClubFacilityTypes?clubId={club_id}")
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::England => "england",
            Region::Scotland => "scotland",
            Region::Wales => "wales",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "england" => Ok(Region::England),
            "scotland" => Ok(Region::Scotland),
            "wales" => Ok(Region::Wales),
            other => Err(anyhow::anyhow!("unknown region: {other}")),
        }
    }
}
