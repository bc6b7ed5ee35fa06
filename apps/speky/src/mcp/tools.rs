//! # Tool Dispatch Table
//!
//! The read-only tools a client can call on a loaded [`Specification`].
//!
//! Each tool is a unit struct implementing [`ToolHandler`] with its own typed
//! arguments and output. [`TOOLS`] lists every tool once; lookup is by name.
//!
//! A handler returns either its output or a [`ToolFailure`]. Failures are
//! domain answers ("Requirement RF9 not found") carried in a successful
//! response, never protocol errors.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use speky_core::{Comment, SpecItem, Specification, Step};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// HANDLER CONTRACT
// =============================================================================

/// Domain-level failure of a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure(pub String);

impl ToolFailure {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// One tool: name, description, typed input and output.
pub trait ToolHandler {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    type Args: DeserializeOwned + JsonSchema;
    type Output: Serialize;

    fn run(spec: &Specification, args: Self::Args) -> Result<Self::Output, ToolFailure>;
}

/// A registered tool, with its handler erased to plain JSON in and out.
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    input_schema: fn() -> Value,
    call: fn(&Specification, Value) -> Result<Result<Value, ToolFailure>, serde_json::Error>,
}

impl Tool {
    const fn of<T: ToolHandler>() -> Self {
        Self {
            name: T::NAME,
            description: T::DESCRIPTION,
            input_schema: input_schema::<T>,
            call: call::<T>,
        }
    }

    /// JSON schema of the tool's arguments.
    #[must_use]
    pub fn input_schema(&self) -> Value {
        (self.input_schema)()
    }

    /// Run the tool on raw JSON arguments.
    ///
    /// The outer error means the arguments do not fit the tool's contract and
    /// the tool never ran. Null arguments are read as an empty object.
    pub fn call(
        &self,
        spec: &Specification,
        arguments: Value,
    ) -> Result<Result<Value, ToolFailure>, serde_json::Error> {
        let arguments = if arguments.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            arguments
        };
        (self.call)(spec, arguments)
    }
}

fn input_schema<T: ToolHandler>() -> Value {
    serde_json::to_value(schemars::schema_for!(T::Args)).unwrap_or_default()
}

fn call<T: ToolHandler>(
    spec: &Specification,
    arguments: Value,
) -> Result<Result<Value, ToolFailure>, serde_json::Error> {
    let args: T::Args = serde_json::from_value(arguments)?;
    match T::run(spec, args) {
        Ok(output) => Ok(Ok(serde_json::to_value(output)?)),
        Err(failure) => Ok(Err(failure)),
    }
}

/// Every tool, in the order `tools/list` reports them.
pub static TOOLS: &[Tool] = &[
    Tool::of::<GetRequirement>(),
    Tool::of::<GetTest>(),
    Tool::of::<SearchRequirements>(),
    Tool::of::<ListTestersOf>(),
    Tool::of::<SearchTests>(),
    Tool::of::<ListReferencesTo>(),
    Tool::of::<ListUntestedRequirements>(),
    Tool::of::<ListAllTags>(),
    Tool::of::<ListAllIds>(),
];

/// Look a tool up by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Tool> {
    TOOLS.iter().find(|tool| tool.name == name)
}

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct IdArgs {
    /// Identifier of the requirement or test.
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RequirementFilter {
    /// Only requirements carrying this tag.
    pub tag: Option<String>,
    /// Only requirements of this category.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TestFilter {
    /// Only tests referring to this requirement id.
    pub tester_of: Option<String>,
    /// Only tests of this category.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CategoryFilter {
    /// Only requirements of this category.
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NoArgs {}

/// Empty filter values count as absent.
fn given(filter: Option<String>) -> Option<String> {
    filter.filter(|value| !value.is_empty())
}

// =============================================================================
// OUTPUTS
// =============================================================================

/// One-line view of an entity, used in every listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Summary {
    fn of(item: &SpecItem, with_category: bool) -> Self {
        Self {
            id: item.id().to_string(),
            category: with_category.then(|| item.category().to_string()),
            short: item.short().map(str::to_string),
            tags: item
                .as_requirement()
                .map(|requirement| requirement.tags.clone())
                .unwrap_or_default(),
        }
    }

    /// Summary of an id that resolves to nothing.
    fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            category: None,
            short: None,
            tags: Vec::new(),
        }
    }
}

/// Summaries of `ids`, sorted by id.
fn summarize(spec: &Specification, ids: &[String], with_category: bool) -> Vec<Summary> {
    let mut summaries: Vec<Summary> = ids
        .iter()
        .map(|id| {
            spec.get(id)
                .map(|item| Summary::of(item, with_category))
                .unwrap_or_else(|| Summary::bare(id))
        })
        .collect();
    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    summaries
}

#[derive(Debug, Serialize)]
pub struct RequirementRecord {
    pub category: String,
    pub id: String,
    pub long: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_statement: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(rename = "ref", skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<Summary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub referenced_by: Vec<Summary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tested_by: Vec<Summary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct TestRecord {
    pub category: String,
    pub id: String,
    pub long: String,
    #[serde(rename = "ref")]
    pub refs: Vec<Summary>,
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prereq: Vec<Summary>,
}

#[derive(Debug, Serialize)]
pub struct RequirementList {
    pub requirements: Vec<Summary>,
}

#[derive(Debug, Serialize)]
pub struct TestList {
    pub tests: Vec<Summary>,
}

#[derive(Debug, Serialize)]
pub struct TagList {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct IdList {
    pub requirements: Vec<String>,
    pub tests: Vec<String>,
}

// =============================================================================
// TOOLS
// =============================================================================

pub struct GetRequirement;

impl ToolHandler for GetRequirement {
    const NAME: &'static str = "get_requirement";
    const DESCRIPTION: &'static str = "Get a requirement with its references, testers and comments";
    type Args = IdArgs;
    type Output = RequirementRecord;

    fn run(spec: &Specification, args: IdArgs) -> Result<RequirementRecord, ToolFailure> {
        let item = spec
            .get(&args.id)
            .ok_or_else(|| ToolFailure::new(format!("Requirement {} not found", args.id)))?;
        let requirement = item.as_requirement().ok_or_else(|| {
            ToolFailure::new(format!("{} is a {}, not a requirement", args.id, item.kind()))
        })?;

        Ok(RequirementRecord {
            category: requirement.category.clone(),
            id: requirement.id.clone(),
            long: requirement.long.clone(),
            short: requirement.short.clone(),
            tags: requirement.tags.clone(),
            client_statement: requirement.client_statement.clone(),
            properties: requirement.properties.clone(),
            refs: summarize(spec, &requirement.refs, false),
            referenced_by: summarize(spec, spec.referenced_by(&requirement.id), false),
            tested_by: summarize(spec, spec.testers_of(&requirement.id), false),
            comments: spec
                .comments_on(&requirement.id)
                .into_iter()
                .cloned()
                .collect(),
        })
    }
}

pub struct GetTest;

impl ToolHandler for GetTest {
    const NAME: &'static str = "get_test";
    const DESCRIPTION: &'static str = "Get a test with its steps, references and prerequisites";
    type Args = IdArgs;
    type Output = TestRecord;

    fn run(spec: &Specification, args: IdArgs) -> Result<TestRecord, ToolFailure> {
        let item = spec
            .get(&args.id)
            .ok_or_else(|| ToolFailure::new(format!("Test {} not found", args.id)))?;
        let test = item.as_test().ok_or_else(|| {
            ToolFailure::new(format!("{} is a {}, not a test", args.id, item.kind()))
        })?;

        Ok(TestRecord {
            category: test.category.clone(),
            id: test.id.clone(),
            long: test.long.clone(),
            refs: summarize(spec, &test.refs, false),
            steps: test.steps.clone(),
            short: test.short.clone(),
            initial: test.initial.clone(),
            prereq: summarize(spec, &test.prereq, false),
        })
    }
}

pub struct SearchRequirements;

impl ToolHandler for SearchRequirements {
    const NAME: &'static str = "search_requirements";
    const DESCRIPTION: &'static str = "Search requirements by tag and/or category";
    type Args = RequirementFilter;
    type Output = RequirementList;

    fn run(spec: &Specification, args: RequirementFilter) -> Result<RequirementList, ToolFailure> {
        // A tag nobody carries matches nothing; it is not a failure.
        let tagged = given(args.tag).map(|tag| spec.tagged(&tag).unwrap_or_default());
        let in_category = match given(args.category) {
            Some(category) => Some(spec.requirements_in(&category).ok_or_else(|| {
                ToolFailure::new(format!("Category '{category}' not found"))
            })?),
            None => None,
        };

        let ids = match (tagged, in_category) {
            (Some(tagged), Some(in_category)) => intersect(in_category, tagged),
            (Some(ids), None) | (None, Some(ids)) => ids.to_vec(),
            (None, None) => spec.requirements().map(|r| r.id.clone()).collect(),
        };
        Ok(RequirementList {
            requirements: summarize(spec, &ids, true),
        })
    }
}

pub struct ListTestersOf;

impl ToolHandler for ListTestersOf {
    const NAME: &'static str = "list_testers_of";
    const DESCRIPTION: &'static str = "List the tests that validate a requirement";
    type Args = IdArgs;
    type Output = TestList;

    fn run(spec: &Specification, args: IdArgs) -> Result<TestList, ToolFailure> {
        if !spec.contains(&args.id) {
            return Err(ToolFailure::new(format!("Requirement {} not found", args.id)));
        }
        Ok(TestList {
            tests: summarize(spec, spec.testers_of(&args.id), true),
        })
    }
}

pub struct SearchTests;

impl ToolHandler for SearchTests {
    const NAME: &'static str = "search_tests";
    const DESCRIPTION: &'static str = "Search tests by tested requirement and/or category";
    type Args = TestFilter;
    type Output = TestList;

    fn run(spec: &Specification, args: TestFilter) -> Result<TestList, ToolFailure> {
        let testers = match given(args.tester_of) {
            Some(id) if spec.contains(&id) => Some(spec.testers_of(&id)),
            Some(id) => return Err(ToolFailure::new(format!("Requirement '{id}' not found"))),
            None => None,
        };
        let in_category = match given(args.category) {
            Some(category) => Some(spec.tests_in(&category).ok_or_else(|| {
                ToolFailure::new(format!("Category '{category}' not found"))
            })?),
            None => None,
        };

        let ids = match (testers, in_category) {
            (Some(testers), Some(in_category)) => intersect(in_category, testers),
            (Some(ids), None) | (None, Some(ids)) => ids.to_vec(),
            (None, None) => spec.tests().map(|t| t.id.clone()).collect(),
        };
        Ok(TestList {
            tests: summarize(spec, &ids, false),
        })
    }
}

pub struct ListReferencesTo;

impl ToolHandler for ListReferencesTo {
    const NAME: &'static str = "list_references_to";
    const DESCRIPTION: &'static str = "List the requirements that refer to a requirement";
    type Args = IdArgs;
    type Output = RequirementList;

    fn run(spec: &Specification, args: IdArgs) -> Result<RequirementList, ToolFailure> {
        if !spec.contains(&args.id) {
            return Err(ToolFailure::new(format!("Requirement {} not found", args.id)));
        }
        Ok(RequirementList {
            requirements: summarize(spec, spec.referenced_by(&args.id), true),
        })
    }
}

pub struct ListUntestedRequirements;

impl ToolHandler for ListUntestedRequirements {
    const NAME: &'static str = "list_untested_requirements";
    const DESCRIPTION: &'static str = "List the requirements no test refers to";
    type Args = CategoryFilter;
    type Output = RequirementList;

    fn run(spec: &Specification, args: CategoryFilter) -> Result<RequirementList, ToolFailure> {
        let candidates = match given(args.category) {
            Some(category) => spec
                .requirements_in(&category)
                .ok_or_else(|| ToolFailure::new(format!("Category '{category}' not found")))?
                .to_vec(),
            None => spec.requirements().map(|r| r.id.clone()).collect(),
        };
        let untested: Vec<String> = candidates
            .into_iter()
            .filter(|id| !spec.is_tested(id))
            .collect();
        Ok(RequirementList {
            requirements: summarize(spec, &untested, true),
        })
    }
}

pub struct ListAllTags;

impl ToolHandler for ListAllTags {
    const NAME: &'static str = "list_all_tags";
    const DESCRIPTION: &'static str = "List every tag used by a requirement";
    type Args = NoArgs;
    type Output = TagList;

    fn run(spec: &Specification, _args: NoArgs) -> Result<TagList, ToolFailure> {
        Ok(TagList {
            tags: spec.tags().map(str::to_string).collect(),
        })
    }
}

pub struct ListAllIds;

impl ToolHandler for ListAllIds {
    const NAME: &'static str = "list_all_ids";
    const DESCRIPTION: &'static str = "List every requirement id and every test id";
    type Args = NoArgs;
    type Output = IdList;

    fn run(spec: &Specification, _args: NoArgs) -> Result<IdList, ToolFailure> {
        Ok(IdList {
            requirements: spec.requirements().map(|r| r.id.clone()).collect(),
            tests: spec.tests().map(|t| t.id.clone()).collect(),
        })
    }
}

/// Ids of `listing` that also appear in `members`, in listing order.
fn intersect(listing: &[String], members: &[String]) -> Vec<String> {
    let members: BTreeSet<&str> = members.iter().map(String::as_str).collect();
    listing
        .iter()
        .filter(|id| members.contains(id.as_str()))
        .cloned()
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
