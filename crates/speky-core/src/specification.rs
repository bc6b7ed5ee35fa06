//! # Graph Store
//!
//! The in-memory traceability graph for Speky.
//!
//! Entities live in a single by-id table. Every relation (category listing,
//! tag membership, reverse references, testers, comments) is a separate
//! adjacency table of ids, filled eagerly at insertion time. Nothing is ever
//! removed or mutated after insertion.
//!
//! All tables are `BTreeMap` for deterministic iteration.

use crate::types::{Comment, ItemKind, Requirement, SpecItem, SpekyError, Test};
use std::collections::BTreeMap;

/// The specification graph: all entities plus their derived indices.
///
/// Built once through [`crate::Loader`], checked once through
/// [`crate::Validator`], then only read.
#[derive(Debug, Clone, Default)]
pub struct Specification {
    /// Unique id -> requirement or test.
    by_id: BTreeMap<String, SpecItem>,

    /// Category -> requirement ids, in insertion order.
    requirements: BTreeMap<String, Vec<String>>,

    /// Category -> test ids, in insertion order.
    tests: BTreeMap<String, Vec<String>>,

    /// Tag -> ids of the requirements carrying it.
    tags: BTreeMap<String, Vec<String>>,

    /// Referred id -> ids of the requirements whose `ref` points at it.
    references: BTreeMap<String, Vec<String>>,

    /// Requirement id -> ids of the tests whose `ref` includes it.
    testers_of: BTreeMap<String, Vec<String>>,

    /// Target id -> comments about it, in load order.
    comments: BTreeMap<String, Vec<Comment>>,
}

impl Specification {
    /// Create a new empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Insert a requirement and index it.
    ///
    /// Fails with `SpekyError::DuplicateId` if the id is already taken by a
    /// requirement or a test. The graph is left untouched in that case.
    pub fn insert_requirement(&mut self, requirement: Requirement) -> Result<(), SpekyError> {
        self.ensure_unique(&requirement.id, ItemKind::Requirement)?;

        let id = requirement.id.clone();
        self.requirements
            .entry(requirement.category.clone())
            .or_default()
            .push(id.clone());
        for referred in &requirement.refs {
            self.references
                .entry(referred.clone())
                .or_default()
                .push(id.clone());
        }
        for tag in &requirement.tags {
            self.tags.entry(tag.clone()).or_default().push(id.clone());
        }
        self.by_id.insert(id, SpecItem::Requirement(requirement));
        Ok(())
    }

    /// Insert a test and index it.
    ///
    /// Fails with `SpekyError::DuplicateId` if the id is already taken.
    pub fn insert_test(&mut self, test: Test) -> Result<(), SpekyError> {
        self.ensure_unique(&test.id, ItemKind::Test)?;

        let id = test.id.clone();
        self.tests
            .entry(test.category.clone())
            .or_default()
            .push(id.clone());
        for verified in &test.refs {
            self.testers_of
                .entry(verified.clone())
                .or_default()
                .push(id.clone());
        }
        self.by_id.insert(id, SpecItem::Test(test));
        Ok(())
    }

    /// Attach a comment to its target. Comments are never deduplicated.
    pub fn insert_comment(&mut self, comment: Comment) {
        self.comments
            .entry(comment.about.clone())
            .or_default()
            .push(comment);
    }

    fn ensure_unique(&self, id: &str, kind: ItemKind) -> Result<(), SpekyError> {
        if self.by_id.contains_key(id) {
            return Err(SpekyError::DuplicateId {
                id: id.to_string(),
                kind,
            });
        }
        Ok(())
    }

    // =========================================================================
    // ENTITY LOOKUP
    // =========================================================================

    /// Lookup a requirement or test by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SpecItem> {
        self.by_id.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    #[must_use]
    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.by_id.get(id).and_then(SpecItem::as_requirement)
    }

    #[must_use]
    pub fn test(&self, id: &str) -> Option<&Test> {
        self.by_id.get(id).and_then(SpecItem::as_test)
    }

    /// All requirements and tests, sorted by id.
    pub fn items(&self) -> impl Iterator<Item = &SpecItem> {
        self.by_id.values()
    }

    /// All requirements, sorted by id.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.by_id.values().filter_map(SpecItem::as_requirement)
    }

    /// All tests, sorted by id.
    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.by_id.values().filter_map(SpecItem::as_test)
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    /// Requirement categories, sorted.
    pub fn requirement_categories(&self) -> impl Iterator<Item = &str> {
        self.requirements.keys().map(String::as_str)
    }

    /// Test categories, sorted.
    pub fn test_categories(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    /// Requirement ids of a category in insertion order, `None` if the
    /// category holds no requirement.
    #[must_use]
    pub fn requirements_in(&self, category: &str) -> Option<&[String]> {
        self.requirements.get(category).map(Vec::as_slice)
    }

    /// Test ids of a category in insertion order, `None` if the category
    /// holds no test.
    #[must_use]
    pub fn tests_in(&self, category: &str) -> Option<&[String]> {
        self.tests.get(category).map(Vec::as_slice)
    }

    // =========================================================================
    // TAGS
    // =========================================================================

    /// All known tag names, sorted.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Ids of the requirements carrying `tag`, `None` for an unknown tag.
    #[must_use]
    pub fn tagged(&self, tag: &str) -> Option<&[String]> {
        self.tags.get(tag).map(Vec::as_slice)
    }

    // =========================================================================
    // REVERSE EDGES
    // =========================================================================

    /// Ids of the requirements whose `ref` points at `id`.
    #[must_use]
    pub fn referenced_by(&self, id: &str) -> &[String] {
        self.references.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of the tests whose `ref` includes `id`.
    #[must_use]
    pub fn testers_of(&self, id: &str) -> &[String] {
        self.testers_of.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn is_tested(&self, id: &str) -> bool {
        self.testers_of.contains_key(id)
    }

    // =========================================================================
    // COMMENTS
    // =========================================================================

    /// Comments about `id` in chronological order. Comments sharing a date
    /// keep their load order.
    #[must_use]
    pub fn comments_on(&self, id: &str) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = self
            .comments
            .get(id)
            .map(|list| list.iter().collect())
            .unwrap_or_default();
        comments.sort_by_key(|comment| comment.time);
        comments
    }

    /// Every comment target id, sorted.
    pub fn comment_targets(&self) -> impl Iterator<Item = &str> {
        self.comments.keys().map(String::as_str)
    }

    // =========================================================================
    // COUNTS
    // =========================================================================

    #[must_use]
    pub fn requirement_count(&self) -> usize {
        self.requirements.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn comment_count(&self) -> usize {
        self.comments.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty() && self.comments.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
