// crates/ticket-bridge-core/src/core/metadata.rs
// ============================================================================
// Module: Canonical Ticket Metadata
// Description: Normalized ticket representation and priority vocabulary.
// Purpose: Decouple downstream processing from tool-specific payload shapes.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Adapters normalize native webhook payloads into
//! [`CanonicalTicketMetadata`]. Priority is a closed enum and each adapter maps
//! its own vocabulary through an explicit [`PriorityTable`].
//! Invariants:
//! - Priority is always one of `high`, `medium`, `low`.
//! - `created_at` is UTC-normalized.
//! - Metadata is immutable once produced and is passed by value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::identifiers::TenantId;
use crate::core::identifiers::TicketId;
use crate::core::identifiers::ToolId;

// ============================================================================
// SECTION: Priority
// ============================================================================

/// Canonical ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Highest urgency.
    High,
    /// Default urgency.
    Medium,
    /// Lowest urgency.
    Low,
}

impl Priority {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adapter-local mapping from native priority names to [`Priority`].
///
/// # Invariants
/// - Native names are stored lowercase.
/// - Unknown or missing values normalize to [`Priority::Medium`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityTable {
    /// Native name and canonical priority pairs.
    entries: &'static [(&'static str, Priority)],
}

impl PriorityTable {
    /// Priority used when a native value is missing or unknown.
    pub const DEFAULT: Priority = Priority::Medium;

    /// Creates a table from lowercase native names.
    #[must_use]
    pub const fn new(entries: &'static [(&'static str, Priority)]) -> Self {
        Self { entries }
    }

    /// Returns the table entries.
    #[must_use]
    pub const fn entries(&self) -> &'static [(&'static str, Priority)] {
        self.entries
    }

    /// Returns true when the table has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maps a native priority value, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn normalize(&self, native: Option<&str>) -> Priority {
        let Some(native) = native else {
            return Self::DEFAULT;
        };
        let needle = native.trim();
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(needle))
            .map_or(Self::DEFAULT, |(_, priority)| *priority)
    }
}

// ============================================================================
// SECTION: Canonical Metadata
// ============================================================================

/// Normalized ticket metadata produced by an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalTicketMetadata {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Tool-issued ticket identifier.
    pub ticket_id: TicketId,
    /// Ticket description; may be empty.
    pub description: String,
    /// Canonical priority.
    pub priority: Priority,
    /// Creation instant in UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Tickets
// ============================================================================

/// Raw ticket fetched from a ticketing tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Tool the ticket was fetched from.
    pub tool_id: ToolId,
    /// Ticket identifier.
    pub ticket_id: TicketId,
    /// Native ticket representation.
    pub raw: Value,
}

// ============================================================================
// SECTION: Enhancement Content
// ============================================================================

/// Internal note content to post back to a ticket.
///
/// # Invariants
/// - Paragraphs are trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancementContent {
    /// Optional heading rendered above the paragraphs.
    pub heading: Option<String>,
    /// Body paragraphs.
    pub paragraphs: Vec<String>,
}

impl EnhancementContent {
    /// Splits free text into paragraphs on blank lines.
    #[must_use]
    pub fn from_text(heading: Option<&str>, text: &str) -> Self {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for line in text.lines() {
            if line.trim().is_empty() {
                flush_paragraph(&mut current, &mut paragraphs);
            } else {
                current.push(line.trim());
            }
        }
        flush_paragraph(&mut current, &mut paragraphs);
        let heading = heading.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string);
        Self { heading, paragraphs }
    }

    /// Returns true when there is nothing to post.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heading.is_none() && self.paragraphs.is_empty()
    }
}

/// Joins buffered lines into a paragraph and clears the buffer.
fn flush_paragraph(current: &mut Vec<&str>, paragraphs: &mut Vec<String>) {
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
        current.clear();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
