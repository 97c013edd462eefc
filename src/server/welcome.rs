//! Welcome message sent to a viewer right after it connects

use serde::{Deserialize, Serialize};

use crate::media::Dimensions;

/// Banner protocol version
pub const WELCOME_VERSION: u32 = 1;

/// Banner length field expected by viewers
pub const WELCOME_LENGTH: u32 = 24;

/// Device display quirks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quirks {
    pub dumb: bool,
    pub always_upright: bool,
    pub tear: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            dumb: false,
            always_upright: true,
            tear: false,
        }
    }
}

/// Welcome banner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub version: u32,
    pub length: u32,
    pub pid: u32,
    pub real_width: u32,
    pub real_height: u32,
    pub virtual_width: u32,
    pub virtual_height: u32,
    pub orientation: u32,
    pub quirks: Quirks,
}

impl Welcome {
    /// Banner for the current stream; zero dimensions if none are known yet
    pub fn new(dimensions: Dimensions, virtual_scale: u32) -> Self {
        let scale = virtual_scale.max(1);
        Self {
            version: WELCOME_VERSION,
            length: WELCOME_LENGTH,
            pid: std::process::id(),
            real_width: dimensions.width,
            real_height: dimensions.height,
            virtual_width: dimensions.width / scale,
            virtual_height: dimensions.height / scale,
            orientation: 0,
            quirks: Quirks::default(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
