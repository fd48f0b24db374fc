//! Tunables for the pipeline, the sample renderer and render sessions.

use std::path::Path;
use std::time::Duration;

use crate::foundation::error::{PostError, PostResult};

/// Post-effect pipeline options.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOpts {
    /// Display gamma handed to effects through the pipeline view.
    pub gamma: f32,
    /// Bucket count of captured histograms.
    pub histogram_bins: usize,
    /// Publish the final working set to the frame buffer's post-processed overlay.
    pub publish: bool,
    /// Worker threads for data-parallel row loops. `None` uses rayon's default.
    pub threads: Option<usize>,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            gamma: 2.2,
            histogram_bins: 256,
            publish: true,
            threads: None,
        }
    }
}

impl PipelineOpts {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> PostResult<()> {
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(PostError::validation("pipeline gamma must be finite and > 0"));
        }
        if self.histogram_bins == 0 {
            return Err(PostError::validation("pipeline histogram_bins must be >= 1"));
        }
        if self.threads == Some(0) {
            return Err(PostError::validation(
                "pipeline 'threads' must be >= 1 when set",
            ));
        }
        Ok(())
    }
}

/// Scan-line renderer options.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanlineRendererOpts {
    /// Pause between two scan-lines, in milliseconds.
    pub line_interval_ms: u64,
    /// Pause before retrying a busy colour channel, in milliseconds.
    pub busy_retry_ms: u64,
    /// Also fill a `DistanceFromCamera` channel when the pixel source provides depth.
    pub depth: bool,
}

impl Default for ScanlineRendererOpts {
    fn default() -> Self {
        Self {
            line_interval_ms: 1,
            busy_retry_ms: 1,
            depth: true,
        }
    }
}

impl ScanlineRendererOpts {
    /// Pause between scan-lines.
    pub fn line_interval(&self) -> Duration {
        Duration::from_millis(self.line_interval_ms)
    }

    /// Pause before retrying a busy channel.
    pub fn busy_retry(&self) -> Duration {
        Duration::from_millis(self.busy_retry_ms.max(1))
    }
}

/// Render-session options.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSessionOpts {
    /// A canceled or aborted rendering that ran at least this long is still worth saving.
    pub valuable_after_ms: u64,
}

impl Default for RenderSessionOpts {
    fn default() -> Self {
        Self {
            valuable_after_ms: 2_000,
        }
    }
}

impl RenderSessionOpts {
    /// Threshold for [`crate::RenderSession::is_last_rendering_valuable`].
    pub fn valuable_after(&self) -> Duration {
        Duration::from_millis(self.valuable_after_ms)
    }
}

/// All option groups, loadable from one JSON document.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Pipeline options.
    pub pipeline: PipelineOpts,
    /// Scan-line renderer options.
    pub renderer: ScanlineRendererOpts,
    /// Session options.
    pub session: RenderSessionOpts,
}

impl Config {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> PostResult<Self> {
        let cfg: Self =
            serde_json::from_str(s).map_err(|e| PostError::serde(format!("config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a JSON config file.
    pub fn from_path(path: &Path) -> PostResult<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| PostError::serde(format!("read config '{}': {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    /// Validate every group.
    pub fn validate(&self) -> PostResult<()> {
        self.pipeline.validate()
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
