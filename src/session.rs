use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::SensorFrame;
use crate::identity::Identity;

/// Recorder state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No session accepting frames
    Idle,
    /// Ticker running, frames being appended
    Recording,
}

/// Session metadata carried into the uploaded document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub device_id: String,
    /// Operator-supplied display name
    pub name: String,
    pub started_at: DateTime<Utc>,
    /// Client-side position smoothing requested by the operator. Carried to
    /// the collector, not applied here.
    pub smoothing: bool,
}

impl SessionMetadata {
    pub fn new(identity: &Identity, smoothing: bool) -> Self {
        SessionMetadata {
            device_id: identity.device_id.clone(),
            name: identity.operator_name.clone(),
            started_at: Utc::now(),
            smoothing,
        }
    }
}

/// A stopped session: metadata plus its frames, immutable from here on.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenSession {
    pub metadata: SessionMetadata,
    pub stopped_at: DateTime<Utc>,
    pub frames: Vec<SensorFrame>,
}

impl FrozenSession {
    pub fn new(metadata: SessionMetadata, frames: Vec<SensorFrame>) -> Self {
        FrozenSession {
            metadata,
            stopped_at: Utc::now(),
            frames,
        }
    }

    /// Running time shown to the operator after stop
    pub fn duration(&self) -> chrono::Duration {
        self.stopped_at - self.metadata.started_at
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_from_identity() {
        let identity = Identity::new("udid-1", "Jesper");
        let meta = SessionMetadata::new(&identity, true);
        assert_eq!(meta.device_id, "udid-1");
        assert_eq!(meta.name, "Jesper");
        assert!(meta.smoothing);
    }

    #[test]
    fn test_frozen_session_duration() {
        let identity = Identity::new("udid-1", "op");
        let mut meta = SessionMetadata::new(&identity, false);
        meta.started_at -= chrono::Duration::seconds(12);

        let frozen = FrozenSession::new(meta, Vec::new());
        assert!(frozen.is_empty());
        assert!(frozen.duration() >= chrono::Duration::seconds(12));
    }
}
