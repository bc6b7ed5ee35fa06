//! # Document Loader
//!
//! Turns decoded documents into typed entities and inserts them into a
//! [`Specification`].
//!
//! - A document is a `serde_yaml::Value` mapping discriminated by `kind`
//!   (`requirements`, `tests` or `comments`)
//! - Missing mandatory fields are fatal, unrecognized fields are reported
//!   as warnings in the returned [`LoadReport`]
//! - Comment rows from a tabular source follow the comment field contract,
//!   without default merging
//!
//! The loader never reads files and never logs: callers decode the text and
//! decide what to do with the warnings.

use crate::specification::Specification;
use crate::types::{Comment, FieldContract, Requirement, SpekyError, Step, Test};
use chrono::NaiveDate;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

// =============================================================================
// LOAD REPORT
// =============================================================================

/// Outcome of a successful load call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Requirements inserted.
    pub requirements: usize,
    /// Tests inserted.
    pub tests: usize,
    /// Comments inserted.
    pub comments: usize,
    /// Non-fatal findings, one message per offending entry.
    pub warnings: Vec<String>,
}

impl LoadReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.requirements += other.requirements;
        self.tests += other.tests;
        self.comments += other.comments;
        self.warnings.extend(other.warnings);
    }
}

// =============================================================================
// DOCUMENT KIND
// =============================================================================

/// The value of the top-level `kind` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Requirements,
    Tests,
    Comments,
}

impl DocumentKind {
    /// Parse a discriminator value.
    #[must_use]
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "requirements" => Some(Self::Requirements),
            "tests" => Some(Self::Tests),
            "comments" => Some(Self::Comments),
            _ => None,
        }
    }

    /// Top-level fields this kind of document may carry.
    const fn top_level_fields(self) -> &'static [&'static str] {
        match self {
            Self::Requirements => &["kind", "category", "requirements"],
            Self::Tests => &["kind", "category", "tests"],
            Self::Comments => &["kind", "comments", "default"],
        }
    }
}

// =============================================================================
// LOADER
// =============================================================================

/// The Loader validates document entries and inserts them in a graph.
pub struct Loader;

impl Loader {
    /// Load one decoded document.
    ///
    /// `origin` names the source in error messages (usually the file path).
    ///
    /// # Errors
    /// - `EmptyDocument` if the document decoded to nothing
    /// - `NotAMapping` if the document or one of its entries is not a mapping
    /// - `MissingFields` if `kind`, a kind-specific top-level field, or a
    ///   mandatory entry field is absent
    /// - `UnknownKind` if `kind` is not one of the three document kinds
    /// - `InvalidField` if a field value does not fit its contract
    /// - `DuplicateId` if an entity id is already loaded
    pub fn load_document(
        spec: &mut Specification,
        document: &Value,
        origin: &str,
    ) -> Result<LoadReport, SpekyError> {
        if document.is_null() {
            return Err(SpekyError::EmptyDocument {
                origin: origin.to_string(),
            });
        }

        let top_level = format!("Top-level of \"{origin}\"");
        let map = as_mapping(document, &top_level)?;
        ensure_fields(&top_level, map, &["kind"])?;

        let kind_text = required_text(map, "kind", &top_level)?;
        let kind = DocumentKind::parse(&kind_text).ok_or_else(|| SpekyError::UnknownKind {
            origin: origin.to_string(),
            kind: kind_text.clone(),
        })?;

        let mut report = LoadReport::default();
        let location = format!("Top-level of {kind_text} file \"{origin}\"");
        warn_extra_fields(
            &location,
            map,
            |field| kind.top_level_fields().contains(&field),
            &mut report,
        );

        match kind {
            DocumentKind::Requirements => {
                ensure_fields(&location, map, &["requirements", "category"])?;
                let category = required_text(map, "category", &location)?;
                for entry in sequence(map, "requirements", &location)? {
                    let requirement = parse_requirement(entry, &category, origin, &mut report)?;
                    spec.insert_requirement(requirement)?;
                    report.requirements += 1;
                }
            }
            DocumentKind::Tests => {
                ensure_fields(&location, map, &["tests", "category"])?;
                let category = required_text(map, "category", &location)?;
                for entry in sequence(map, "tests", &location)? {
                    let test = parse_test(entry, &category, origin, &mut report)?;
                    spec.insert_test(test)?;
                    report.tests += 1;
                }
            }
            DocumentKind::Comments => {
                ensure_fields(&location, map, &["comments"])?;
                let defaults = comment_defaults(map, &location)?;
                for entry in sequence(map, "comments", &location)? {
                    let entry_location = format!("Definition of a Comment in \"{origin}\"");
                    let mut merged = defaults.clone();
                    for (key, value) in as_mapping(entry, &entry_location)? {
                        merged.insert(key.clone(), value.clone());
                    }
                    spec.insert_comment(parse_comment(&merged, origin, &mut report)?);
                    report.comments += 1;
                }
            }
        }

        Ok(report)
    }

    /// Load comments from the rows of a tabular source.
    ///
    /// Each row is one comment entry keyed by column header. Rows get no
    /// defaults: `external` must be a column like every other field.
    pub fn load_comment_rows<I>(
        spec: &mut Specification,
        rows: I,
        origin: &str,
    ) -> Result<LoadReport, SpekyError>
    where
        I: IntoIterator<Item = BTreeMap<String, String>>,
    {
        let mut report = LoadReport::default();
        for row in rows {
            let entry: Mapping = row
                .into_iter()
                .map(|(key, value)| (Value::String(key), Value::String(value)))
                .collect();
            spec.insert_comment(parse_comment(&entry, origin, &mut report)?);
            report.comments += 1;
        }
        Ok(report)
    }
}

// =============================================================================
// ENTITY PARSING
// =============================================================================

/// Validate the id and field contract of a requirement or test entry.
///
/// Returns the entry mapping, its id and the location used by every
/// subsequent message about this entry.
fn entry_header<'a, T: FieldContract>(
    entry: &'a Value,
    origin: &str,
    report: &mut LoadReport,
) -> Result<(&'a Mapping, String, String), SpekyError> {
    let kind = T::KIND.type_name();
    let anonymous = format!("Definition of a {kind} in \"{origin}\"");
    let map = as_mapping(entry, &anonymous)?;
    ensure_fields(&anonymous, map, &["id"])?;
    let id = required_text(map, "id", &anonymous)?;

    let location = format!("Definition of {kind} {id} in \"{origin}\"");
    ensure_fields(&location, map, T::MANDATORY)?;
    warn_extra_fields(&location, map, T::recognizes, report);
    Ok((map, id, location))
}

fn parse_requirement(
    entry: &Value,
    category: &str,
    origin: &str,
    report: &mut LoadReport,
) -> Result<Requirement, SpekyError> {
    let (map, id, location) = entry_header::<Requirement>(entry, origin, report)?;

    let mut tags = text_list(map, "tags", &location)?;
    let mut seen = std::collections::BTreeSet::new();
    tags.retain(|tag| seen.insert(tag.clone()));

    Ok(Requirement {
        long: required_text(map, "long", &location)?,
        short: optional_text(map, "short", &location)?,
        category: category.to_string(),
        tags,
        client_statement: optional_text(map, "client_statement", &location)?,
        properties: text_map(map, "properties", &location)?,
        refs: text_list(map, "ref", &location)?,
        id,
    })
}

fn parse_test(
    entry: &Value,
    category: &str,
    origin: &str,
    report: &mut LoadReport,
) -> Result<Test, SpekyError> {
    let (map, id, location) = entry_header::<Test>(entry, origin, report)?;

    let refs = text_list(map, "ref", &location)?;
    if refs.is_empty() {
        return Err(invalid(&location, "ref", "must list at least one requirement"));
    }

    let entries = sequence(map, "steps", &location)?;
    if entries.is_empty() {
        return Err(invalid(&location, "steps", "must contain at least one step"));
    }
    let mut steps = Vec::with_capacity(entries.len());
    for (index, step) in entries.iter().enumerate() {
        let step_location = format!("Step {} of Test {id} in \"{origin}\"", index + 1);
        let step_map = as_mapping(step, &step_location)?;
        ensure_fields(&step_location, step_map, &["action"])?;
        warn_extra_fields(
            &step_location,
            step_map,
            |field| Step::FIELDS.contains(&field),
            report,
        );
        steps.push(Step {
            action: required_text(step_map, "action", &step_location)?,
            run: optional_text(step_map, "run", &step_location)?,
            expected: optional_text(step_map, "expected", &step_location)?,
            sample: optional_text(step_map, "sample", &step_location)?,
            sample_lang: optional_text(step_map, "sample_lang", &step_location)?,
        });
    }

    Ok(Test {
        long: required_text(map, "long", &location)?,
        short: optional_text(map, "short", &location)?,
        category: category.to_string(),
        refs,
        steps,
        initial: optional_text(map, "initial", &location)?,
        prereq: text_list(map, "prereq", &location)?,
        id,
    })
}

/// Defaults merged under every comment entry: `external: false`, overridden
/// by the document's optional `default` mapping.
fn comment_defaults(map: &Mapping, location: &str) -> Result<Mapping, SpekyError> {
    let mut defaults = Mapping::new();
    defaults.insert(Value::String("external".to_string()), Value::Bool(false));
    match map.get("default") {
        None | Some(Value::Null) => {}
        Some(value) => {
            let overrides = as_mapping(value, &format!("default of {location}"))?;
            for (key, value) in overrides {
                defaults.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(defaults)
}

fn parse_comment(
    map: &Mapping,
    origin: &str,
    report: &mut LoadReport,
) -> Result<Comment, SpekyError> {
    let location = format!("Definition of a Comment in \"{origin}\"");
    ensure_fields(&location, map, Comment::FIELDS)?;
    warn_extra_fields(
        &location,
        map,
        |field| Comment::FIELDS.contains(&field),
        report,
    );

    let date = required_text(map, "date", &location)?;
    let time = NaiveDate::parse_from_str(date.trim(), Comment::DATE_FORMAT).map_err(|e| {
        invalid(
            &location,
            "date",
            &format!("\"{date}\" is not a DD/MM/YYYY date ({e})"),
        )
    })?;

    Ok(Comment {
        about: required_text(map, "about", &location)?,
        from: required_text(map, "from", &location)?,
        text: required_text(map, "text", &location)?,
        external: parse_external(map.get("external"), &location, report),
        date,
        time,
    })
}

/// True for `true`, `1` and the strings `true`/`1` in any case. Any other
/// value reads as false; spellings outside true/false/1/0 also add a warning.
fn parse_external(value: Option<&Value>, location: &str, report: &mut LoadReport) -> bool {
    let shown = match value {
        None | Some(Value::Null) => return false,
        Some(Value::Bool(flag)) => return *flag,
        Some(Value::Number(number)) => match number.as_i64() {
            Some(1) => return true,
            Some(0) => return false,
            _ => number.to_string(),
        },
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => return true,
            "false" | "0" | "" => return false,
            _ => format!("\"{text}\""),
        },
        Some(_) => "a collection".to_string(),
    };
    report.warnings.push(format!(
        "Field external in {location} is {shown}, read as false"
    ));
    false
}

// =============================================================================
// FIELD HELPERS
// =============================================================================

fn invalid(location: &str, field: &str, reason: &str) -> SpekyError {
    SpekyError::InvalidField {
        location: location.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn as_mapping<'a>(value: &'a Value, location: &str) -> Result<&'a Mapping, SpekyError> {
    value.as_mapping().ok_or_else(|| SpekyError::NotAMapping {
        location: location.to_string(),
    })
}

/// Render a mapping key as text. Non-scalar keys are shown in debug form.
fn key_text(key: &Value) -> String {
    scalar_text(key).unwrap_or_else(|| format!("{key:?}"))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Fail if any of `fields` is not a key of `map`. Missing fields are
/// reported together, sorted.
fn ensure_fields(location: &str, map: &Mapping, fields: &[&str]) -> Result<(), SpekyError> {
    let mut missing: Vec<String> = fields
        .iter()
        .filter(|field| !map.contains_key(**field))
        .map(|field| (*field).to_string())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(SpekyError::MissingFields {
        location: location.to_string(),
        fields: missing,
    })
}

fn warn_extra_fields(
    location: &str,
    map: &Mapping,
    recognized: impl Fn(&str) -> bool,
    report: &mut LoadReport,
) {
    let mut extras: Vec<String> = map
        .keys()
        .map(key_text)
        .filter(|key| !recognized(key))
        .collect();
    if extras.is_empty() {
        return;
    }
    extras.sort();
    let plural = if extras.len() > 1 { "s" } else { "" };
    report.warnings.push(format!(
        "Found extra field{plural} in {location}: {}",
        extras.join(", ")
    ));
}

fn required_text(map: &Mapping, field: &str, location: &str) -> Result<String, SpekyError> {
    match optional_text(map, field, location)? {
        Some(text) => Ok(text),
        None => Err(invalid(location, field, "must not be empty")),
    }
}

fn optional_text(map: &Mapping, field: &str, location: &str) -> Result<Option<String>, SpekyError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_text(value)
            .map(Some)
            .ok_or_else(|| invalid(location, field, "expected text")),
    }
}

/// A sequence of scalars. A lone scalar is read as a one-element list.
fn text_list(map: &Mapping, field: &str, location: &str) -> Result<Vec<String>, SpekyError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| {
                scalar_text(item).ok_or_else(|| invalid(location, field, "expected a list of text"))
            })
            .collect(),
        Some(value) => scalar_text(value)
            .map(|text| vec![text])
            .ok_or_else(|| invalid(location, field, "expected a list of text")),
    }
}

fn text_map(
    map: &Mapping,
    field: &str,
    location: &str,
) -> Result<BTreeMap<String, String>, SpekyError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Mapping(entries)) => entries
            .iter()
            .map(|(key, value)| match (scalar_text(key), scalar_text(value)) {
                (Some(key), Some(value)) => Ok((key, value)),
                _ => Err(invalid(location, field, "expected a mapping of text to text")),
            })
            .collect(),
        Some(_) => Err(invalid(location, field, "expected a mapping of text to text")),
    }
}

fn sequence<'a>(map: &'a Mapping, field: &str, location: &str) -> Result<&'a [Value], SpekyError> {
    match map.get(field) {
        Some(Value::Sequence(items)) => Ok(items.as_slice()),
        None | Some(Value::Null) => Ok(&[]),
        Some(_) => Err(invalid(location, field, "expected a list")),
    }
}

// =============================================================================
// TESTS
// =============================================================================
