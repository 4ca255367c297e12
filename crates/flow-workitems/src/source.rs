// source.rs - Readers for the tier artifacts that feed work-item generation.
//
// Epics live in `tier2/epics/`, stories and tasks in `tier3/stories/` and
// `tier3/tasks/`, one YAML document each. Several fields accept either a
// bare string or a structured object; both forms deserialize here and are
// normalized by the generator.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::WorkItemError;
use crate::types::{AcceptanceCriterion, DocumentType, RelatedDocument};

pub(crate) const EPICS_DIR: &str = "tier2/epics";
pub(crate) const STORIES_DIR: &str = "tier3/stories";
pub(crate) const TASKS_DIR: &str = "tier3/tasks";
const ADRS_DIR: &str = "tier3/adrs";

/// A source artifact together with its path relative to the initiative root.
pub(crate) trait SourceArtifact: DeserializeOwned {
    fn id(&self) -> &str;
    fn set_source_path(&mut self, path: String);
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum EpicDependency {
    Text(String),
    Detailed {
        #[serde(rename = "type", default)]
        kind: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum EpicRisk {
    Text(String),
    Detailed {
        description: String,
        #[serde(default)]
        mitigation: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum EpicMetric {
    Text(String),
    Detailed {
        metric: String,
        #[serde(default)]
        target: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SourceEpic {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub moscow: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub complexity: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub dependencies: Vec<EpicDependency>,
    #[serde(default)]
    pub risks: Vec<EpicRisk>,
    #[serde(default)]
    pub success_metrics: Vec<EpicMetric>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(skip)]
    pub source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum SourceUserStory {
    Sentence(String),
    Parts {
        #[serde(default)]
        persona: Option<String>,
        #[serde(default)]
        want: Option<String>,
        #[serde(default)]
        benefit: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SourceStory {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub user_story: Option<SourceUserStory>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub epic_id: Option<String>,
    #[serde(default)]
    pub moscow: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub story_points: Option<f64>,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(skip)]
    pub source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SourceTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub story_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub implementation_notes: Option<String>,
    #[serde(default)]
    pub affected_files: Vec<String>,
    #[serde(default)]
    pub test_requirements: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(skip)]
    pub source_path: String,
}

macro_rules! source_artifact {
    ($($ty:ty),*) => {$(
        impl SourceArtifact for $ty {
            fn id(&self) -> &str {
                &self.id
            }

            fn set_source_path(&mut self, path: String) {
                self.source_path = path;
            }
        }
    )*};
}

source_artifact!(SourceEpic, SourceStory, SourceTask);

/// Every parsable YAML artifact in `<initiative>/<subdir>`, sorted by id.
///
/// A missing directory yields no artifacts. Files that fail to parse are
/// skipped.
pub(crate) fn read_artifacts<T: SourceArtifact>(
    initiative_dir: &Path,
    subdir: &str,
) -> Result<Vec<T>, WorkItemError> {
    let mut artifacts: Vec<T> = Vec::new();
    for name in yaml_files(&initiative_dir.join(subdir))? {
        let path = initiative_dir.join(subdir).join(&name);
        let content = fs::read_to_string(&path).map_err(|source| WorkItemError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        match serde_yaml::from_str::<T>(&content) {
            Ok(mut artifact) => {
                artifact.set_source_path(format!("{}/{}", subdir, name));
                artifacts.push(artifact);
            }
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "skipping malformed source artifact"
                );
            }
        }
    }
    artifacts.sort_by(|a, b| natural_cmp(a.id(), b.id()));
    Ok(artifacts)
}

/// Architecture decision records under `tier3/adrs/`, linked relative to
/// the `workitems/` directory.
pub(crate) fn read_adrs(initiative_dir: &Path) -> Result<Vec<RelatedDocument>, WorkItemError> {
    let dir = initiative_dir.join(ADRS_DIR);
    let names = match fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .filter(|name| name.ends_with(".md")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(WorkItemError::IoError {
                path: dir.display().to_string(),
                source,
            })
        }
    };

    let mut adrs: Vec<RelatedDocument> = names
        .map(|name| {
            let stem = name.trim_end_matches(".md").to_string();
            RelatedDocument {
                kind: DocumentType::Adr,
                title: stem.replace('-', " "),
                path: format!("../{}/{}", ADRS_DIR, name),
                id: stem,
            }
        })
        .collect();
    adrs.sort_by(|a, b| natural_cmp(&a.id, &b.id));
    Ok(adrs)
}

fn yaml_files(dir: &Path) -> Result<Vec<String>, WorkItemError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(WorkItemError::IoError {
                path: dir.display().to_string(),
                source,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| WorkItemError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml" || ext == "yml") {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Compare ids so that embedded numbers order by value: `EP-2` < `EP-10`.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Number(x), Chunk::Number(y)) => {
                        let (x, y) = (x.trim_start_matches('0'), y.trim_start_matches('0'));
                        x.len().cmp(&y.len()).then_with(|| x.cmp(y))
                    }
                    (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
                    (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
                    (Chunk::Text(x), Chunk::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

enum Chunk<'a> {
    Number(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let numeric = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != numeric)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if numeric {
            Chunk::Number(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}
