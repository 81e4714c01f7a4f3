//! Content catalog: topics, their ordered paths and the puzzles attached to them.
//!
//! The progress engine only ever reads from the catalog. It is injected as a
//! trait object so tests can run against fixtures.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{NotFoundKind, Result, SageError};
use crate::puzzle::normalize_pairs;

/// Default point value of a puzzle
pub const DEFAULT_PUZZLE_POINTS: u32 = 10;

fn default_points() -> u32 {
    DEFAULT_PUZZLE_POINTS
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    #[default]
    Article,
    Video,
    Interactive,
    Documentation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResource {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: ResourceKind,
}

/// One lesson inside a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub order: u32,
    /// Minutes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

/// Puzzle types the catalog can carry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PuzzleType {
    Matching,
    Timeline,
    MultipleChoice,
    FillBlank,
}

impl fmt::Display for PuzzleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PuzzleType::Matching => "matching",
            PuzzleType::Timeline => "timeline",
            PuzzleType::MultipleChoice => "multiple-choice",
            PuzzleType::FillBlank => "fill-blank",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchPair {
    pub term: String,
    pub definition: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchingData {
    #[serde(default)]
    pub pairs: Vec<MatchPair>,
}

/// Canonical term -> value mapping of a matching puzzle.
///
/// Authored either as an object or as a list of single-entry objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "Value")]
pub struct MatchingSolution(pub BTreeMap<String, Value>);

impl TryFrom<Value> for MatchingSolution {
    type Error = String;

    fn try_from(value: Value) -> std::result::Result<Self, Self::Error> {
        normalize_pairs(&value)
            .map(MatchingSolution)
            .ok_or_else(|| {
                "matching solution must be an object or a list of single-entry objects"
                    .to_string()
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimelineData {
    #[serde(default)]
    pub events: Vec<String>,
}

/// Type-specific payload and hidden solution of a puzzle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PuzzleBody {
    Matching {
        #[serde(default)]
        data: MatchingData,
        #[serde(skip_serializing)]
        solution: MatchingSolution,
    },
    Timeline {
        #[serde(default)]
        data: TimelineData,
        #[serde(skip_serializing)]
        solution: Vec<String>,
    },
    MultipleChoice {
        #[serde(default)]
        data: Value,
        #[serde(default, skip_serializing)]
        solution: Value,
    },
    FillBlank {
        #[serde(default)]
        data: Value,
        #[serde(default, skip_serializing)]
        solution: Value,
    },
}

impl PuzzleBody {
    pub fn puzzle_type(&self) -> PuzzleType {
        match self {
            PuzzleBody::Matching { .. } => PuzzleType::Matching,
            PuzzleBody::Timeline { .. } => PuzzleType::Timeline,
            PuzzleBody::MultipleChoice { .. } => PuzzleType::MultipleChoice,
            PuzzleBody::FillBlank { .. } => PuzzleType::FillBlank,
        }
    }

    /// Payload safe to hand to a client: nothing in it gives the answer away
    pub fn public_data(&self) -> Value {
        match self {
            PuzzleBody::Matching { data, .. } => {
                let terms: Vec<&str> = data.pairs.iter().map(|p| p.term.as_str()).collect();
                let mut definitions: Vec<&str> =
                    data.pairs.iter().map(|p| p.definition.as_str()).collect();
                definitions.sort_unstable();
                serde_json::json!({ "terms": terms, "definitions": definitions })
            }
            PuzzleBody::Timeline { data, .. } => {
                let mut events = data.events.clone();
                events.sort();
                serde_json::json!({ "events": events })
            }
            PuzzleBody::MultipleChoice { data, .. } | PuzzleBody::FillBlank { data, .. } => {
                data.clone()
            }
        }
    }
}

/// Puzzle definition. The solution is read from the catalog but never
/// written back out; clients get a [`PuzzleView`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub path_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default = "default_points")]
    pub points: u32,
    #[serde(flatten)]
    pub body: PuzzleBody,
}

impl Puzzle {
    pub fn puzzle_type(&self) -> PuzzleType {
        self.body.puzzle_type()
    }

    pub fn view(&self) -> PuzzleView {
        PuzzleView {
            path_id: self.path_id.clone(),
            question: self.question.clone(),
            points: self.points,
            puzzle_type: self.puzzle_type(),
            data: self.body.public_data(),
        }
    }
}

/// Client-facing puzzle, solution stripped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleView {
    pub path_id: String,
    pub question: String,
    pub points: u32,
    #[serde(rename = "type")]
    pub puzzle_type: PuzzleType,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub topic_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub introduction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub paths: Vec<Path>,
    #[serde(default)]
    pub puzzles: Vec<Puzzle>,
    #[serde(default)]
    pub external_resources: Vec<ExternalResource>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total_duration: Option<u32>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub published: bool,
}

impl Topic {
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn path(&self, path_id: &str) -> Option<&Path> {
        self.paths.iter().find(|p| p.id == path_id)
    }

    /// First puzzle attached to the path. Several may exist; the first one wins.
    pub fn puzzle_for(&self, path_id: &str) -> Option<&Puzzle> {
        self.puzzles.iter().find(|p| p.path_id == path_id)
    }

    pub fn ordered_paths(&self) -> Vec<Path> {
        let mut paths = self.paths.clone();
        paths.sort_by_key(|p| p.order);
        paths
    }

    pub fn summary(&self) -> TopicSummary {
        TopicSummary {
            topic_id: self.topic_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            icon: self.icon.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty,
            estimated_total_duration: self.estimated_total_duration,
        }
    }

    pub fn view(&self) -> TopicView {
        TopicView {
            summary: self.summary(),
            introduction: self.introduction.clone(),
            paths: self.ordered_paths(),
            puzzles: self.puzzles.iter().map(Puzzle::view).collect(),
            external_resources: self.external_resources.clone(),
            prerequisites: self.prerequisites.clone(),
        }
    }
}

/// Listing form of a topic
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub category: String,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_total_duration: Option<u32>,
}

/// Full client-facing topic, puzzles as views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    #[serde(flatten)]
    pub summary: TopicSummary,
    pub introduction: String,
    pub paths: Vec<Path>,
    pub puzzles: Vec<PuzzleView>,
    pub external_resources: Vec<ExternalResource>,
    pub prerequisites: Vec<String>,
}

/// Filter for topic listings
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub include_unpublished: bool,
}

impl TopicFilter {
    pub fn matches(&self, topic: &Topic) -> bool {
        if !self.include_unpublished && !topic.published {
            return false;
        }
        if let Some(category) = &self.category {
            if !topic.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if topic.difficulty != difficulty {
                return false;
            }
        }
        true
    }
}

/// Read-only source of topics
pub trait ContentCatalog: Send + Sync {
    fn topic(&self, topic_id: &str) -> Option<&Topic>;

    fn topics(&self) -> Vec<&Topic>;

    fn topic_path_count(&self, topic_id: &str) -> Result<usize> {
        self.topic(topic_id)
            .map(Topic::path_count)
            .ok_or_else(|| SageError::not_found(NotFoundKind::Topic, topic_id))
    }

    fn path(&self, topic_id: &str, path_id: &str) -> Result<&Path> {
        let topic = self
            .topic(topic_id)
            .ok_or_else(|| SageError::not_found(NotFoundKind::Topic, topic_id))?;
        topic
            .path(path_id)
            .ok_or_else(|| SageError::not_found(NotFoundKind::Path, path_id))
    }

    fn puzzle(&self, topic_id: &str, path_id: &str) -> Result<&Puzzle> {
        let topic = self
            .topic(topic_id)
            .ok_or_else(|| SageError::not_found(NotFoundKind::Topic, topic_id))?;
        topic
            .puzzle_for(path_id)
            .ok_or_else(|| SageError::not_found(NotFoundKind::Puzzle, path_id))
    }

    fn list_topics(&self, filter: &TopicFilter) -> Vec<TopicSummary> {
        self.topics()
            .into_iter()
            .filter(|t| filter.matches(t))
            .map(Topic::summary)
            .collect()
    }
}

/// Catalog held entirely in memory, loaded once at startup
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    topics: BTreeMap<String, Topic>,
}

impl InMemoryCatalog {
    pub fn new(topics: Vec<Topic>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for topic in topics {
            if topic.topic_id.trim().is_empty() {
                return Err(SageError::InvalidInput("topic without topicId".to_string()));
            }
            if map.contains_key(&topic.topic_id) {
                return Err(SageError::InvalidInput(format!(
                    "duplicate topicId '{}'",
                    topic.topic_id
                )));
            }
            map.insert(topic.topic_id.clone(), topic);
        }
        Ok(Self { topics: map })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let topics: Vec<Topic> = serde_json::from_str(json)?;
        Self::new(topics)
    }

    /// Load a catalog file (a JSON array of topics)
    pub fn load(path: &FsPath) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content)?;
        info!(
            "Loaded catalog from {}: {} topics",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl ContentCatalog for InMemoryCatalog {
    fn topic(&self, topic_id: &str) -> Option<&Topic> {
        self.topics.get(topic_id)
    }

    fn topics(&self) -> Vec<&Topic> {
        self.topics.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> Value {
        json!([{
            "topicId": "ai-history",
            "title": "History of AI",
            "introduction": "From Turing to transformers",
            "category": "computing",
            "published": true,
            "paths": [
                { "id": "key-milestones", "title": "Milestones", "order": 2 },
                { "id": "early-challenges", "title": "Early challenges", "order": 1 }
            ],
            "puzzles": [
                {
                    "pathId": "early-challenges",
                    "type": "matching",
                    "question": "Match the challenges",
                    "data": { "pairs": [
                        { "term": "Frame Problem", "definition": "What changes" },
                        { "term": "Combinatorial Explosion", "definition": "Exponential growth" }
                    ]},
                    "solution": [
                        { "Frame Problem": "What changes" },
                        { "Combinatorial Explosion": "Exponential growth" }
                    ]
                },
                {
                    "pathId": "key-milestones",
                    "type": "timeline",
                    "points": 15,
                    "data": { "events": ["dartmouth", "deep-blue", "alphago"] },
                    "solution": ["dartmouth", "deep-blue", "alphago"]
                }
            ]
        }])
    }

    #[test]
    fn test_parse_catalog() {
        let catalog = InMemoryCatalog::from_json_str(&sample_json().to_string()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.topic_path_count("ai-history").unwrap(), 2);

        let matching = catalog.puzzle("ai-history", "early-challenges").unwrap();
        assert_eq!(matching.puzzle_type(), PuzzleType::Matching);
        assert_eq!(matching.points, DEFAULT_PUZZLE_POINTS);

        let timeline = catalog.puzzle("ai-history", "key-milestones").unwrap();
        assert_eq!(timeline.points, 15);
    }

    #[test]
    fn test_missing_references() {
        let catalog = InMemoryCatalog::from_json_str(&sample_json().to_string()).unwrap();
        assert!(matches!(
            catalog.topic_path_count("nope"),
            Err(SageError::NotFound { kind: NotFoundKind::Topic, .. })
        ));
        assert!(matches!(
            catalog.puzzle("ai-history", "nope"),
            Err(SageError::NotFound { kind: NotFoundKind::Puzzle, .. })
        ));
        assert!(matches!(
            catalog.path("ai-history", "nope"),
            Err(SageError::NotFound { kind: NotFoundKind::Path, .. })
        ));
    }

    #[test]
    fn test_duplicate_topic_rejected() {
        let mut topics = sample_json();
        let dup = topics[0].clone();
        topics.as_array_mut().unwrap().push(dup);
        assert!(InMemoryCatalog::from_json_str(&topics.to_string()).is_err());
    }

    #[test]
    fn test_view_hides_solution() {
        let catalog = InMemoryCatalog::from_json_str(&sample_json().to_string()).unwrap();
        let view = catalog.puzzle("ai-history", "key-milestones").unwrap().view();
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("solution").is_none());
        assert_eq!(json["type"], "timeline");
        assert_eq!(json["data"]["events"], json!(["alphago", "dartmouth", "deep-blue"]));

        let topic = catalog.topic("ai-history").unwrap();
        let topic_view = serde_json::to_string(&topic.view()).unwrap();
        assert!(!topic_view.contains("solution"));
    }

    #[test]
    fn test_serialized_topic_carries_no_solution() {
        let catalog = InMemoryCatalog::from_json_str(&sample_json().to_string()).unwrap();
        let topic = serde_json::to_value(catalog.topic("ai-history").unwrap()).unwrap();
        for puzzle in topic["puzzles"].as_array().unwrap() {
            assert!(puzzle.get("solution").is_none(), "{}", puzzle);
            assert!(puzzle.get("type").is_some());
        }

        let puzzle = catalog.puzzle("ai-history", "key-milestones").unwrap();
        let json = serde_json::to_value(puzzle).unwrap();
        assert!(json.get("solution").is_none());
        assert_eq!(json["data"]["events"][0], "dartmouth");
    }

    #[test]
    fn test_paths_ordered() {
        let catalog = InMemoryCatalog::from_json_str(&sample_json().to_string()).unwrap();
        let paths = catalog.topic("ai-history").unwrap().ordered_paths();
        assert_eq!(paths[0].id, "early-challenges");
    }

    #[test]
    fn test_filter_unpublished() {
        let mut topics = sample_json();
        topics[0]["published"] = json!(false);
        let catalog = InMemoryCatalog::from_json_str(&topics.to_string()).unwrap();
        assert!(catalog.list_topics(&TopicFilter::default()).is_empty());

        let filter = TopicFilter {
            include_unpublished: true,
            category: Some("Computing".to_string()),
            ..Default::default()
        };
        assert_eq!(catalog.list_topics(&filter).len(), 1);
    }
}
