//! Logging and debugging facilities for Horizon Collections.
//!
//! This module provides:
//! - Target and span names for filtering `tracing` output by subsystem
//! - A text formatter for decorator chains
//!
//! # Tracing Integration
//!
//! Nothing is printed unless the application installs a subscriber:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_collections::manager=trace")
//!     .init();
//! ```
//!
//! # Chain Visualization
//!
//! ```
//! use horizon_collections_core::logging::{ChainDebug, ChainFormatOptions, ChainStyle, StageInfo};
//!
//! let stages = vec![
//!     StageInfo::new(1, "filter", 0, 3),
//!     StageInfo::new(2, "sort", 10, 3),
//! ];
//! let text = ChainDebug::new(5, stages)
//!     .with_options(ChainFormatOptions::default().with_style(ChainStyle::Compact))
//!     .to_string();
//! assert_eq!(text, "source[5] -> filter#1[3] -> sort#2[3]");
//! ```

use std::fmt;

/// Span names used throughout Horizon Collections.
pub mod span_names {
    /// A raw mutation and its whole propagation.
    pub const MUTATION: &str = "horizon_collections::mutation";
    /// One change travelling through the decorator chain.
    pub const PROPAGATE: &str = "horizon_collections::propagate";
    /// Draining out-of-band decorator notifications.
    pub const PENDING: &str = "horizon_collections::pending";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Raw collection target.
    pub const LIST: &str = "horizon_collections::list";
    /// Decorator manager target.
    pub const MANAGER: &str = "horizon_collections::manager";
    /// Concrete decorators target.
    pub const DECORATOR: &str = "horizon_collections::decorator";
    /// Batch scope target.
    pub const BATCH: &str = "horizon_collections_core::batch";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "horizon_collections_core::signal";
}

/// Style options for chain visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainStyle {
    /// ASCII characters for branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Single-line representation.
    Compact,
}

/// Configuration for chain debug output.
#[derive(Debug, Clone)]
pub struct ChainFormatOptions {
    /// The style of visualization.
    pub style: ChainStyle,
    /// Whether to show decorator IDs.
    pub show_ids: bool,
    /// Whether to show each stage's output length.
    pub show_lengths: bool,
}

impl Default for ChainFormatOptions {
    fn default() -> Self {
        Self {
            style: ChainStyle::default(),
            show_ids: true,
            show_lengths: true,
        }
    }
}

impl ChainFormatOptions {
    /// Options for minimal output: names only.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_lengths: false,
            ..Default::default()
        }
    }

    /// Set the visualization style.
    pub fn with_style(mut self, style: ChainStyle) -> Self {
        self.style = style;
        self
    }

    /// Show or hide decorator IDs.
    pub fn with_ids(mut self, show: bool) -> Self {
        self.show_ids = show;
        self
    }

    /// Show or hide output lengths.
    pub fn with_lengths(mut self, show: bool) -> Self {
        self.show_lengths = show;
        self
    }
}

/// A snapshot of one stage in a decorator chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageInfo {
    /// Raw decorator ID.
    pub id: u64,
    /// Decorator name.
    pub name: String,
    /// Decorator priority.
    pub priority: i32,
    /// Number of items in the stage's output.
    pub len: usize,
}

impl StageInfo {
    pub fn new(id: u64, name: impl Into<String>, priority: i32, len: usize) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            len,
        }
    }
}

/// Renders a decorator chain, source first.
#[derive(Debug, Clone)]
pub struct ChainDebug {
    source_len: usize,
    stages: Vec<StageInfo>,
    options: ChainFormatOptions,
}

impl ChainDebug {
    /// Create a formatter for a source of `source_len` items and its stages.
    pub fn new(source_len: usize, stages: Vec<StageInfo>) -> Self {
        Self {
            source_len,
            stages,
            options: ChainFormatOptions::default(),
        }
    }

    /// Replace the formatting options.
    pub fn with_options(mut self, options: ChainFormatOptions) -> Self {
        self.options = options;
        self
    }

    /// The stages being rendered.
    pub fn stages(&self) -> &[StageInfo] {
        &self.stages
    }

    fn write_stage(
        &self,
        f: &mut fmt::Formatter<'_>,
        stage: &StageInfo,
        compact: bool,
    ) -> fmt::Result {
        f.write_str(&stage.name)?;
        if self.options.show_ids {
            write!(f, "#{}", stage.id)?;
        }
        if !compact {
            write!(f, " (priority {})", stage.priority)?;
        }
        if self.options.show_lengths {
            if compact {
                write!(f, "[{}]", stage.len)?;
            } else {
                write!(f, " [len {}]", stage.len)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ChainDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.options.style == ChainStyle::Compact {
            f.write_str("source")?;
            if self.options.show_lengths {
                write!(f, "[{}]", self.source_len)?;
            }
            for stage in &self.stages {
                f.write_str(" -> ")?;
                self.write_stage(f, stage, true)?;
            }
            return Ok(());
        }

        let (tee, corner) = match self.options.style {
            ChainStyle::Ascii => ("|-- ", "`-- "),
            _ => ("\u{251c}\u{2500}\u{2500} ", "\u{2514}\u{2500}\u{2500} "),
        };

        writeln!(f, "Decorator chain ({} stages):", self.stages.len())?;
        f.write_str("source")?;
        if self.options.show_lengths {
            write!(f, " [len {}]", self.source_len)?;
        }
        f.write_str("\n")?;

        let count = self.stages.len();
        for (i, stage) in self.stages.iter().enumerate() {
            f.write_str(if i + 1 == count { corner } else { tee })?;
            self.write_stage(f, stage, false)?;
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ChainDebug {
        ChainDebug::new(
            6,
            vec![
                StageInfo::new(3, "filter", 0, 4),
                StageInfo::new(7, "sorting", 5, 4),
            ],
        )
    }

    #[test]
    fn test_chain_format_unicode() {
        let output = chain().to_string();
        assert!(output.starts_with("Decorator chain (2 stages):"));
        assert!(output.contains("source [len 6]"));
        assert!(output.contains("\u{251c}\u{2500}\u{2500} filter#3 (priority 0) [len 4]"));
        assert!(output.contains("\u{2514}\u{2500}\u{2500} sorting#7 (priority 5) [len 4]"));
    }

    #[test]
    fn test_chain_format_ascii() {
        let output = chain()
            .with_options(ChainFormatOptions::default().with_style(ChainStyle::Ascii))
            .to_string();
        assert!(output.contains("|-- filter#3"));
        assert!(output.contains("`-- sorting#7"));
    }

    #[test]
    fn test_chain_format_minimal() {
        let output = chain().with_options(ChainFormatOptions::minimal()).to_string();
        assert!(output.contains("filter (priority 0)"));
        assert!(!output.contains('#'));
        assert!(!output.contains("len"));
    }

    #[test]
    fn test_chain_format_compact_empty() {
        let output = ChainDebug::new(0, Vec::new())
            .with_options(ChainFormatOptions::default().with_style(ChainStyle::Compact))
            .to_string();
        assert_eq!(output, "source[0]");
    }
}
