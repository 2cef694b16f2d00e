use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chart::{IcicleChart, DEFAULT_MIN_SEGMENT_SIZE, DEFAULT_TRANSITION};
use crate::error::{Error, Result};
use crate::label::LabelRamps;
use crate::orientation::Orientation;

/// Chart options that can be kept in a TOML file.
///
/// ```toml
/// orientation = "top-down"
/// exclude_root = true
/// transition_ms = 400
///
/// [label_ramps.height]
/// low = 12.0
/// high = 30.0
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub orientation: Orientation,
    pub exclude_root: bool,
    pub min_segment_size: f64,
    pub show_labels: bool,
    pub transition_ms: u64,
    pub label_ramps: LabelRamps,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            orientation: Orientation::default(),
            exclude_root: false,
            min_segment_size: DEFAULT_MIN_SEGMENT_SIZE,
            show_labels: true,
            transition_ms: DEFAULT_TRANSITION.as_millis() as u64,
            label_ramps: LabelRamps::default(),
        }
    }
}

impl ChartSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::parse(&text).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded chart settings");
        Ok(settings)
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn transition(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn apply<T>(&self, chart: &mut IcicleChart<T>) {
        chart.set_orientation(self.orientation);
        chart.set_exclude_root(self.exclude_root);
        chart.set_min_segment_size(self.min_segment_size);
        chart.set_show_labels(self.show_labels);
        chart.set_transition_duration(self.transition());
        chart.set_label_ramps(self.label_ramps);
    }
}
