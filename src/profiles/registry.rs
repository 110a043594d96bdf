use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{ProcessingProfile, ProfileError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Invalid(#[from] ProfileError),

    #[error("failed to persist profile registry: {0}")]
    Persist(#[from] std::io::Error),

    #[error("profile registry file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// In-memory profile registry backed by a JSON file.
///
/// Readers see whole profiles only: an update swaps the map entry under the
/// write lock after the new profile validated, and the file write happens
/// via temp-file + rename so a crash never leaves a half-written registry.
/// A failed persist rolls the in-memory entry back.
pub struct ProfileRegistry {
    path: PathBuf,
    profiles: RwLock<BTreeMap<String, ProcessingProfile>>,
}

impl ProfileRegistry {
    /// Load the registry from `path`, seeding the built-in default profile
    /// (and persisting it) when the file does not exist yet.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();

        let profiles = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let list: Vec<ProcessingProfile> = serde_json::from_str(&raw)?;

            let mut map = BTreeMap::new();
            for profile in list {
                profile.validate()?;
                map.insert(profile.id.clone(), profile);
            }
            info!(count = map.len(), path = %path.display(), "Loaded profile registry");
            map
        } else {
            warn!(path = %path.display(), "Profile registry not found, seeding default profile");
            let default = ProcessingProfile::default_profile();
            let mut map = BTreeMap::new();
            map.insert(default.id.clone(), default);
            write_atomic(&path, &map)?;
            map
        };

        Ok(Self {
            path,
            profiles: RwLock::new(profiles),
        })
    }

    pub async fn get(&self, id: &str) -> Option<ProcessingProfile> {
        self.profiles.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.profiles.read().await.contains_key(id)
    }

    pub async fn list(&self) -> Vec<ProcessingProfile> {
        self.profiles.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Create or update a profile by id.
    ///
    /// The registry is append-only by id: existing entries are rewritten in
    /// place, never deleted. Persistence failure rolls back the in-memory
    /// change before the error is returned.
    pub async fn upsert(&self, profile: ProcessingProfile) -> Result<(), RegistryError> {
        profile.validate()?;

        let mut profiles = self.profiles.write().await;
        let previous = profiles.insert(profile.id.clone(), profile.clone());

        if let Err(err) = write_atomic(&self.path, &profiles) {
            match previous {
                Some(old) => {
                    profiles.insert(profile.id.clone(), old);
                }
                None => {
                    profiles.remove(&profile.id);
                }
            }
            return Err(err.into());
        }

        debug!(id = %profile.id, "Profile upserted");
        Ok(())
    }
}

/// Write the registry as a JSON array via temp file + rename
fn write_atomic(
    path: &Path,
    profiles: &BTreeMap<String, ProcessingProfile>,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let list: Vec<&ProcessingProfile> = profiles.values().collect();
    let raw = serde_json::to_vec_pretty(&list)?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
