//! # CLI Command Implementations

use super::SourceArgs;
use speky::mcp;
use speky_core::{SpecItem, SpekyError, Specification};
use tokio::io::BufReader;

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Load and validate, then print what was loaded.
pub fn cmd_check(sources: &SourceArgs, json_mode: bool) -> Result<(), SpekyError> {
    let (spec, report) = sources.source_set().load()?;
    let summary = Summary::of(&spec, report.warnings.len());

    if json_mode {
        let output = serde_json::json!({
            "requirements": summary.requirements,
            "tests": summary.tests,
            "comments": summary.comments,
            "requirement_categories": summary.requirement_categories,
            "test_categories": summary.test_categories,
            "tags": summary.tags,
            "untested": summary.untested,
            "warnings": summary.warnings,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Speky Specification Check");
    println!("=========================");
    println!(
        "Requirements: {} in {} categories",
        summary.requirements, summary.requirement_categories
    );
    println!(
        "Tests:        {} in {} categories",
        summary.tests, summary.test_categories
    );
    println!("Comments:     {}", summary.comments);
    println!("Tags:         {}", summary.tags);
    if summary.warnings > 0 {
        println!("Warnings:     {}", summary.warnings);
    }
    if !summary.untested.is_empty() {
        println!();
        println!("Untested requirements:");
        for title in &summary.untested {
            println!("  {title}");
        }
    }
    println!();
    println!("All references resolved");

    Ok(())
}

struct Summary {
    requirements: usize,
    tests: usize,
    comments: usize,
    requirement_categories: usize,
    test_categories: usize,
    tags: usize,
    /// Titles of requirements no test refers to, in id order.
    untested: Vec<String>,
    warnings: usize,
}

impl Summary {
    fn of(spec: &Specification, warnings: usize) -> Self {
        Self {
            requirements: spec.requirement_count(),
            tests: spec.test_count(),
            comments: spec.comment_count(),
            requirement_categories: spec.requirement_categories().count(),
            test_categories: spec.test_categories().count(),
            tags: spec.tags().count(),
            untested: spec
                .items()
                .filter(|item| item.as_requirement().is_some() && !spec.is_tested(item.id()))
                .map(SpecItem::title)
                .collect(),
            warnings,
        }
    }
}

// =============================================================================
// MCP COMMAND
// =============================================================================

/// Load and validate, then serve queries on stdin/stdout until end of input.
pub async fn cmd_mcp(sources: &SourceArgs) -> Result<(), SpekyError> {
    let (spec, _) = sources.source_set().load()?;
    tracing::info!("Specifications loaded successfully");

    mcp::run_server(
        &spec,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
    .map_err(|e| SpekyError::Io(format!("Request channel failed: {e}")))
}
