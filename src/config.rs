//! Navigation configuration, deserialized from the host's JSON.

use serde::Deserialize;

use crate::error::Result;
use crate::types::TextDirection;

pub const DESKTOP_BREAKPOINT: f32 = 1200.0;
pub const SMALL_DESKTOP_BREAKPOINT: f32 = 900.0;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// The header carries the small-desktop modifier.
    pub small_desktop: bool,
    /// Explicit breakpoint, wins over `small_desktop`.
    pub desktop_breakpoint: Option<f32>,
    pub direction: TextDirection,
    /// Activating a trigger asks the host to scroll it into view.
    pub sticky_header: bool,
    pub debug: bool,
}

impl NavConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Viewport width from which the desktop layout applies.
    pub fn desktop_breakpoint(&self) -> f32 {
        match self.desktop_breakpoint {
            Some(bp) => bp,
            None if self.small_desktop => SMALL_DESKTOP_BREAKPOINT,
            None => DESKTOP_BREAKPOINT,
        }
    }

    pub fn is_rtl(&self) -> bool {
        self.direction == TextDirection::Rtl
    }
}
