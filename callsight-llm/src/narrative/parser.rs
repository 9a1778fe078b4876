//! Merge-response parsing.
//!
//! The merge call returns free text that should contain two delimited
//! sections. Parsing sits behind [`MergeResponseParser`] so the extraction
//! strategy can change without touching the engine or the pipeline.

use super::prompts::{CHANGE_END, CHANGE_START, OVERALL_END, OVERALL_START};

/// Result of parsing a merge response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMerge {
    Sections {
        overall: String,
        change_summary: String,
    },
    /// The response did not follow the output contract.
    Unparsed,
}

/// Extracts the updated narrative and change summary from raw model output.
pub trait MergeResponseParser: Send + Sync {
    fn parse(&self, raw: &str) -> ParsedMerge;
}

/// Locates each section between a start and an end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedSectionParser {
    pub overall: (String, String),
    pub change: (String, String),
}

impl Default for DelimitedSectionParser {
    fn default() -> Self {
        Self {
            overall: (OVERALL_START.to_string(), OVERALL_END.to_string()),
            change: (CHANGE_START.to_string(), CHANGE_END.to_string()),
        }
    }
}

impl DelimitedSectionParser {
    fn section<'a>(raw: &'a str, start: &str, end: &str) -> Option<&'a str> {
        let after_start = raw.find(start)? + start.len();
        let rest = &raw[after_start..];
        let len = rest.find(end)?;
        Some(rest[..len].trim())
    }
}

impl MergeResponseParser for DelimitedSectionParser {
    fn parse(&self, raw: &str) -> ParsedMerge {
        let overall = Self::section(raw, &self.overall.0, &self.overall.1);
        let change = Self::section(raw, &self.change.0, &self.change.1);
        match (overall, change) {
            (Some(overall), Some(change)) if !overall.is_empty() => ParsedMerge::Sections {
                overall: overall.to_string(),
                change_summary: change.to_string(),
            },
            _ => ParsedMerge::Unparsed,
        }
    }
}
