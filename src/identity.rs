use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RecorderError, Result};

/// Who is recording: a stable per-device id and the operator's display name.
///
/// Persisted as a small TOML profile so the name is asked for once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub device_id: String,
    #[serde(default)]
    pub operator_name: String,
}

impl Identity {
    pub fn new(device_id: impl Into<String>, operator_name: impl Into<String>) -> Self {
        Identity {
            device_id: device_id.into(),
            operator_name: operator_name.into(),
        }
    }

    /// Load the profile at `path`, creating it on first run.
    ///
    /// A fresh device id is generated when the file is missing. `prompt` is
    /// called only when no operator name has been stored yet; its answer is
    /// saved back to the profile.
    pub fn load_or_create<F>(path: &Path, prompt: F) -> Result<Self>
    where
        F: FnOnce() -> Option<String>,
    {
        let mut identity = match Self::load(path)? {
            Some(identity) => identity,
            None => {
                let identity = Identity::new(uuid::Uuid::new_v4().to_string().to_uppercase(), "");
                tracing::info!("created device id {}", identity.device_id);
                identity
            }
        };

        let mut dirty = !path.exists();
        if identity.operator_name.trim().is_empty() {
            if let Some(name) = prompt().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
                identity.operator_name = name;
                dirty = true;
            }
        }

        if dirty {
            identity.save(path)?;
        }
        Ok(identity)
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(path)
            .map_err(|e| RecorderError::Identity(format!("read {}: {e}", path.display())))?;
        let identity: Identity = toml::from_str(&s)
            .map_err(|e| RecorderError::Identity(format!("parse {}: {e}", path.display())))?;
        Ok(Some(identity))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::Identity(format!("create {}: {e}", parent.display())))?;
        }
        let s = toml::to_string(self).map_err(|e| RecorderError::Identity(e.to_string()))?;

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, s)
            .map_err(|e| RecorderError::Identity(format!("write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, path)
            .map_err(|e| RecorderError::Identity(format!("rename to {}: {e}", path.display())))?;
        Ok(())
    }
}
