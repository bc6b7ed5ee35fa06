//! # Reference Validator
//!
//! Checks that every id named by a `ref` list or a comment target exists in
//! the graph. Runs once, after all documents are loaded.
//!
//! Entities are visited in id order and comment targets after them, so the
//! reported failure is the same for the same set of documents regardless of
//! the order they were given in.

use crate::specification::Specification;
use crate::types::SpekyError;

/// Referential integrity checks over a loaded [`Specification`].
pub struct Validator;

impl Validator {
    /// Check every reference in the graph.
    ///
    /// # Errors
    /// - `UnresolvedReference` for the first `ref` entry naming an absent id
    /// - `UnresolvedComment` for the first comment target naming an absent id
    pub fn check_references(spec: &Specification) -> Result<(), SpekyError> {
        for item in spec.items() {
            if let Some(referred) = item.refs().iter().find(|id| !spec.contains(id)) {
                return Err(SpekyError::UnresolvedReference {
                    referred: referred.clone(),
                    referrer: item.id().to_string(),
                });
            }
        }

        if let Some(about) = spec.comment_targets().find(|id| !spec.contains(id)) {
            return Err(SpekyError::UnresolvedComment {
                about: about.to_string(),
            });
        }

        Ok(())
    }

    /// Every dangling reference, in the same order `check_references`
    /// visits them.
    #[must_use]
    pub fn dangling_references(spec: &Specification) -> Vec<SpekyError> {
        let mut found = Vec::new();
        for item in spec.items() {
            found.extend(
                item.refs()
                    .iter()
                    .filter(|id| !spec.contains(id))
                    .map(|referred| SpekyError::UnresolvedReference {
                        referred: referred.clone(),
                        referrer: item.id().to_string(),
                    }),
            );
        }
        found.extend(
            spec.comment_targets()
                .filter(|id| !spec.contains(id))
                .map(|about| SpekyError::UnresolvedComment {
                    about: about.to_string(),
                }),
        );
        found
    }
}

// =============================================================================
// TESTS
// =============================================================================
