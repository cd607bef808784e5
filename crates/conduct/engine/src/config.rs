//! Engine configuration.
//!
//! Built once at process start and handed to [`crate::ConductEngine::new`];
//! the engine never mutates it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Make the class leader tier mandatory: teacher coverage then counts only
    /// leader snapshots and teacher accept requires the leader gate.
    #[serde(default)]
    pub leader_tier_required: bool,
}
