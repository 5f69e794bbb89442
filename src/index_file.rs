use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::record::CanonicalRecord;

pub const INDEX_FILE: &str = "clubs_index.json";
pub const NO_IMAGES_FILE: &str = "clubs_index_no_images.json";

/// The flat JSON artifact the fetch pass produces, and the import commands
/// read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubIndex {
    pub total: usize,
    pub detailed: bool,
    pub clubs: Vec<CanonicalRecord>,
}

impl ClubIndex {
    pub fn new(clubs: Vec<CanonicalRecord>, detailed: bool) -> Self {
        Self {
            total: clubs.len(),
            detailed,
            clubs,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let index =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(index)
    }

    /// Indented UTF-8, human-readable by design.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let payload = serde_json::to_string_pretty(self).context("serializing club index")?;
        fs::write(path, payload).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Companion without the embedded base64 logo payloads, small enough to
    /// commit.
    pub fn strip_images(&self) -> ClubIndex {
        let mut clubs = self.clubs.clone();
        for club in &mut clubs {
            club.remove("image");
        }
        ClubIndex::new(clubs, self.detailed)
    }
}
