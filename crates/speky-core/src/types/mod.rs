//! # Core Type Definitions
//!
//! This module contains the value records of the Speky traceability graph:
//! - Entity kinds and their field contracts (`ItemKind`, `FieldContract`)
//! - Entity records (`Requirement`, `Test`, `Step`, `Comment`)
//! - The tagged entity stored in the by-id table (`SpecItem`)
//! - Error types (`SpekyError`)
//!
//! Entities are immutable once inserted in a `Specification`. Relations
//! between them live in the store's adjacency tables, never on the records.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY KIND
// =============================================================================

/// Discriminator between the two identified entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Requirement,
    Test,
}

impl ItemKind {
    /// Lower-case name used in query results and domain failures.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Requirement => "requirement",
            Self::Test => "test",
        }
    }

    /// Capitalized name used in load-time error locations.
    #[must_use]
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Requirement => "Requirement",
            Self::Test => "Test",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// FIELD CONTRACT
// =============================================================================

/// Per-kind field schema shared by requirements and tests.
///
/// The loader uses the schema to reject entries missing a mandatory field and
/// to flag fields outside the recognized set.
pub trait FieldContract {
    /// The kind this contract describes.
    const KIND: ItemKind;

    /// Fields that must be present besides `id`.
    const MANDATORY: &'static [&'static str];

    /// Fields that may be present.
    const OPTIONAL: &'static [&'static str];

    /// The unique identifier.
    fn id(&self) -> &str;

    /// The optional short label.
    fn short(&self) -> Option<&str>;

    /// Whether `field` belongs to the recognized set of this kind.
    fn recognizes(field: &str) -> bool {
        field == "id" || Self::MANDATORY.contains(&field) || Self::OPTIONAL.contains(&field)
    }

    /// Display title: the id in backquotes, followed by the short label if any.
    fn title(&self) -> String {
        match self.short() {
            Some(short) => format!("`{}` {}", self.id(), short),
            None => format!("`{}`", self.id()),
        }
    }
}

// =============================================================================
// REQUIREMENT
// =============================================================================

/// A statement of intent, gathered into a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub id: String,
    pub long: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Assigned from the enclosing document.
    pub category: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_statement: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(rename = "ref", skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<String>,
}

impl FieldContract for Requirement {
    const KIND: ItemKind = ItemKind::Requirement;
    const MANDATORY: &'static [&'static str] = &["long"];
    const OPTIONAL: &'static [&'static str] =
        &["short", "tags", "client_statement", "properties", "ref"];

    fn id(&self) -> &str {
        &self.id
    }

    fn short(&self) -> Option<&str> {
        self.short.as_deref()
    }
}

// =============================================================================
// TEST
// =============================================================================

/// One step of a test procedure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_lang: Option<String>,
}

impl Step {
    /// Recognized fields of a step entry.
    pub const FIELDS: &'static [&'static str] =
        &["action", "run", "expected", "sample", "sample_lang"];
}

/// A verification procedure for one or more requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Test {
    pub id: String,
    pub long: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Assigned from the enclosing document.
    pub category: String,
    /// Requirements verified by this test. Never empty.
    #[serde(rename = "ref")]
    pub refs: Vec<String>,
    /// Never empty.
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    /// Tests whose end state is the start state of this one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prereq: Vec<String>,
}

impl FieldContract for Test {
    const KIND: ItemKind = ItemKind::Test;
    const MANDATORY: &'static [&'static str] = &["long", "ref", "steps"];
    const OPTIONAL: &'static [&'static str] = &["short", "initial", "prereq"];

    fn id(&self) -> &str {
        &self.id
    }

    fn short(&self) -> Option<&str> {
        self.short.as_deref()
    }
}

// =============================================================================
// SPEC ITEM
// =============================================================================

/// An entry of the by-id table: either a requirement or a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecItem {
    Requirement(Requirement),
    Test(Test),
}

impl SpecItem {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Requirement(r) => &r.id,
            Self::Test(t) => &t.id,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Requirement(_) => ItemKind::Requirement,
            Self::Test(_) => ItemKind::Test,
        }
    }

    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Requirement(r) => &r.category,
            Self::Test(t) => &t.category,
        }
    }

    #[must_use]
    pub fn short(&self) -> Option<&str> {
        match self {
            Self::Requirement(r) => r.short.as_deref(),
            Self::Test(t) => t.short.as_deref(),
        }
    }

    /// Outgoing references, in declaration order.
    #[must_use]
    pub fn refs(&self) -> &[String] {
        match self {
            Self::Requirement(r) => &r.refs,
            Self::Test(t) => &t.refs,
        }
    }

    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Requirement(r) => r.title(),
            Self::Test(t) => t.title(),
        }
    }

    #[must_use]
    pub const fn as_requirement(&self) -> Option<&Requirement> {
        match self {
            Self::Requirement(r) => Some(r),
            Self::Test(_) => None,
        }
    }

    #[must_use]
    pub const fn as_test(&self) -> Option<&Test> {
        match self {
            Self::Test(t) => Some(t),
            Self::Requirement(_) => None,
        }
    }
}

// =============================================================================
// COMMENT
// =============================================================================

/// A dated annotation about one requirement or test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    /// Target entity id.
    #[serde(skip)]
    pub about: String,
    pub from: String,
    /// The date as written (`DD/MM/YYYY`).
    pub date: String,
    pub text: String,
    pub external: bool,
    /// Parsed `date`, used for chronological ordering.
    #[serde(skip)]
    pub time: NaiveDate,
}

impl Comment {
    /// Recognized fields of a comment entry. All of them are mandatory once
    /// defaults are merged.
    pub const FIELDS: &'static [&'static str] = &["about", "from", "date", "text", "external"];

    /// Date format of the `date` field.
    pub const DATE_FORMAT: &'static str = "%d/%m/%Y";
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while building or checking a specification.
///
/// Every variant is fatal to the load sequence. Query-time failures are not
/// represented here: they are values returned by the query layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpekyError {
    /// The document decoded to nothing.
    #[error("Empty file \"{origin}\"")]
    EmptyDocument { origin: String },

    /// One or more mandatory fields are absent.
    #[error("{}", missing_fields_message(.location, .fields))]
    MissingFields { location: String, fields: Vec<String> },

    /// A document or entry is not a mapping.
    #[error("Expected a mapping for {location}")]
    NotAMapping { location: String },

    /// A field is present but its value does not fit the contract.
    #[error("Invalid field \"{field}\" in {location}: {reason}")]
    InvalidField {
        location: String,
        field: String,
        reason: String,
    },

    /// The `kind` discriminator names no known document kind.
    #[error(
        "Unknown kind \"{kind}\" in top-level of \"{origin}\", expected requirements, tests or comments"
    )]
    UnknownKind { origin: String, kind: String },

    /// A requirement or test id is already taken.
    #[error("Multiple definitions of {kind} \"{id}\". ID must be unique")]
    DuplicateId { id: String, kind: ItemKind },

    /// A `ref` entry names no known entity.
    #[error("Requirement {referred}, referred from {referrer}, does not exist")]
    UnresolvedReference { referred: String, referrer: String },

    /// A comment is about no known entity.
    #[error("Requirement or Test {about}, referred from a comment, does not exist")]
    UnresolvedComment { about: String },

    /// An input source could not be read.
    #[error("I/O error: {0}")]
    Io(String),

    /// An input source could not be decoded into a document tree.
    #[error("Parse error in \"{origin}\": {message}")]
    Parse { origin: String, message: String },
}

fn missing_fields_message(location: &str, fields: &[String]) -> String {
    if fields.len() > 1 {
        format!("Missing fields from {location}: {}", fields.join(", "))
    } else {
        format!("Missing field from {location}: {}", fields.join(""))
    }
}

// =============================================================================
// TESTS
// =============================================================================
