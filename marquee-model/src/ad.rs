//! Ad-exchange creative metadata.

use serde::{Deserialize, Serialize};

use crate::geo::{GeoFence, PlayerPosition};

/// A creative returned by the ad exchange for an adspace slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: String,
    pub url: String,
    pub mime_type: String,
    /// Playback duration in seconds.
    pub duration: u32,
    pub is_geo_aware: bool,
    pub geo_fence: Option<GeoFence>,
}

impl Ad {
    /// Whether the ad may serve under the current location.
    pub fn is_geo_active(&self, fix: Option<&PlayerPosition>) -> bool {
        if !self.is_geo_aware {
            return true;
        }
        match (&self.geo_fence, fix) {
            (Some(fence), Some(fix)) => fence.contains(fix),
            _ => false,
        }
    }
}
