// generate.rs - WorkItemGenerator: tier artifacts → universal work-item tree.
//
// Generation is a full, destructive rebuild: `<initiative>/workitems/` is
// deleted and rewritten from the current source files on every run, and
// hierarchical ids are reassigned from the current ordering. Stories whose
// `epic_id` and tasks whose `story_id` do not resolve are left out.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use flow_initiative::{EventDispatcher, FlowConfig, FlowEvent, InitiativeStore};
use regex::Regex;
use serde::Serialize;

use crate::error::WorkItemError;
use crate::source::{
    self, EpicDependency, EpicMetric, EpicRisk, SourceEpic, SourceStory, SourceTask,
    SourceUserStory, EPICS_DIR, STORIES_DIR, TASKS_DIR,
};
use crate::types::{
    AcceptanceCriterion, Dependency, DependencyType, DocumentType, Estimate, EstimateUnit,
    EstimateValue, GenerationResult, ItemCounts, Level, Manifest, Priority, ProjectInfo,
    RelatedDocument, RelatedDocuments, Risk, SourceRef, SourceType, Status, SuccessMetric,
    Summary, TreeNode, UserStory, WorkItem, WorkItemMeta, SCHEMA_VERSION,
};

/// Output directory inside an initiative.
pub const WORKITEMS_DIR: &str = "workitems";
/// Manifest file name inside [`WORKITEMS_DIR`].
pub const MANIFEST_FILE: &str = "manifest.yaml";
/// Optional template files copied next to the manifest.
pub const SCHEMA_TEMPLATE: &str = "_schema.yaml";
pub const README_TEMPLATE: &str = "README.md";

const MANIFEST_SOURCE: &str = "initiative-flow";
const PRD_PATH: &str = "tier2/prd.md";
const PROBLEM_STATEMENT: &str = "## Problem Statement";
const DESCRIPTION_LIMIT: usize = 500;
const SLUG_LIMIT: usize = 30;

/// Lowercase `text`, collapse every run of non-alphanumerics to `-`, trim
/// leading/trailing dashes, and cut to 30 characters.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug.chars().take(SLUG_LIMIT).collect()
}

fn user_story_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)As an? (.+?),? I want (.+?),? so that (.+)")
            .expect("valid user story regex")
    })
}

/// Split "As a X, I want Y, so that Z" into its parts.
fn parse_user_story(sentence: &str) -> Option<UserStory> {
    let caps = user_story_regex().captures(sentence)?;
    Some(UserStory {
        as_a: caps[1].trim().to_string(),
        i_want: caps[2].trim().to_string(),
        so_that: caps[3].trim().to_string(),
    })
}

struct StoryNode {
    item: WorkItem,
    tasks: Vec<WorkItem>,
}

struct EpicNode {
    item: WorkItem,
    stories: Vec<StoryNode>,
}

/// Source artifacts grouped under their parents, in id order.
struct Hierarchy<'s> {
    epics: Vec<(&'s SourceEpic, Vec<(&'s SourceStory, Vec<&'s SourceTask>)>)>,
}

impl<'s> Hierarchy<'s> {
    fn build(epics: &'s [SourceEpic], stories: &'s [SourceStory], tasks: &'s [SourceTask]) -> Self {
        let epic_index: HashMap<&str, usize> = epics
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.as_str(), i))
            .collect();

        let mut grouped: Vec<Vec<&SourceStory>> = vec![Vec::new(); epics.len()];
        let mut story_slot: HashMap<&str, (usize, usize)> = HashMap::new();
        for story in stories {
            let Some(&e) = story.epic_id.as_deref().and_then(|id| epic_index.get(id)) else {
                tracing::debug!(story = %story.id, "story has no known epic, leaving it out");
                continue;
            };
            if story_slot.contains_key(story.id.as_str()) {
                continue;
            }
            story_slot.insert(&story.id, (e, grouped[e].len()));
            grouped[e].push(story);
        }

        let mut task_groups: HashMap<(usize, usize), Vec<&SourceTask>> = HashMap::new();
        for task in tasks {
            let Some(&slot) = task.story_id.as_deref().and_then(|id| story_slot.get(id)) else {
                tracing::debug!(task = %task.id, "task has no known story, leaving it out");
                continue;
            };
            task_groups.entry(slot).or_default().push(task);
        }

        let epics = epics
            .iter()
            .zip(grouped)
            .enumerate()
            .map(|(e, (epic, stories))| {
                let stories = stories
                    .into_iter()
                    .enumerate()
                    .map(|(s, story)| (story, task_groups.remove(&(e, s)).unwrap_or_default()))
                    .collect();
                (epic, stories)
            })
            .collect();
        Self { epics }
    }

    /// Source id → universal id, for resolving `dependencies`.
    fn universal_ids(&self) -> HashMap<&'s str, String> {
        let mut ids = HashMap::new();
        for (e, &(epic, ref stories)) in self.epics.iter().enumerate() {
            let epic_uid = (e + 1).to_string();
            ids.insert(epic.id.as_str(), item_id(&epic_uid, &epic.title));
            for (s, &(story, ref tasks)) in stories.iter().enumerate() {
                let story_uid = format!("{}.{}", epic_uid, s + 1);
                ids.insert(story.id.as_str(), item_id(&story_uid, &story.title));
                for (t, &task) in tasks.iter().enumerate() {
                    let task_uid = format!("{}.{}", story_uid, t + 1);
                    ids.insert(task.id.as_str(), item_id(&task_uid, &task.title));
                }
            }
        }
        ids
    }
}

fn item_id(index: &str, title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        // Keep the id well-formed for titles with no usable characters.
        format!("{}-item", index)
    } else {
        format!("{}-{}", index, slug)
    }
}

fn estimate_from(value: Option<f64>, unit: EstimateUnit) -> Option<Estimate> {
    let value = value.filter(|v| *v > 0.0)?;
    let value = if value.fract() == 0.0 {
        EstimateValue::Whole(value as u64)
    } else {
        EstimateValue::Fractional(value)
    };
    Some(Estimate { value, unit })
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Builds work items for one initiative under a project layout.
pub struct WorkItemGenerator {
    config: FlowConfig,
    dispatcher: EventDispatcher,
}

impl WorkItemGenerator {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            config: config.clone(),
            dispatcher: EventDispatcher::new(),
        }
    }

    /// Send a `work_items_generated` event to `dispatcher` after each successful run.
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Regenerate `<initiative>/workitems/` from the tier artifacts.
    ///
    /// Returns an unsuccessful result, without touching the output directory,
    /// when there are no epics. I/O failures are errors.
    pub fn generate(&self, initiative_id: &str) -> Result<GenerationResult, WorkItemError> {
        let initiative_dir = self.config.initiative_dir(initiative_id);
        let output_dir = initiative_dir.join(WORKITEMS_DIR);
        let generated_at = Utc::now();

        let epics: Vec<SourceEpic> = source::read_artifacts(&initiative_dir, EPICS_DIR)?;
        let stories: Vec<SourceStory> = source::read_artifacts(&initiative_dir, STORIES_DIR)?;
        let tasks: Vec<SourceTask> = source::read_artifacts(&initiative_dir, TASKS_DIR)?;
        let adrs = source::read_adrs(&initiative_dir)?;

        if epics.is_empty() {
            return Ok(GenerationResult {
                success: false,
                path: output_dir,
                items_generated: ItemCounts::default(),
                errors: vec![format!("No epics found in {}/", EPICS_DIR)],
                warnings: Vec::new(),
            });
        }

        let hierarchy = Hierarchy::build(&epics, &stories, &tasks);
        let mut builder = ItemBuilder {
            generated_at,
            universal_ids: hierarchy.universal_ids(),
            warnings: Vec::new(),
        };
        let tree = builder.build(&hierarchy);

        let manifest = Manifest {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at,
            source: MANIFEST_SOURCE.to_string(),
            project: ProjectInfo {
                id: initiative_id.to_string(),
                title: self.project_title(initiative_id),
                description: read_problem_statement(&initiative_dir.join(PRD_PATH)),
            },
            tree: tree.iter().map(epic_tree_node).collect(),
            related_documents: RelatedDocuments {
                prd: Some(RelatedDocument {
                    kind: DocumentType::Prd,
                    id: "prd".to_string(),
                    title: "Product Requirements Document".to_string(),
                    path: format!("../{}", PRD_PATH),
                }),
                adrs,
            },
            summary: Summary::of(all_items(&tree)),
        };

        self.write_tree(&output_dir, &manifest, &tree)?;

        let counts = ItemCounts {
            epics: tree.len(),
            stories: tree.iter().map(|e| e.stories.len()).sum(),
            tasks: tree
                .iter()
                .flat_map(|e| &e.stories)
                .map(|s| s.tasks.len())
                .sum(),
        };
        tracing::info!(
            initiative = initiative_id,
            epics = counts.epics,
            stories = counts.stories,
            tasks = counts.tasks,
            "work items generated"
        );
        self.dispatcher.dispatch(&FlowEvent::work_items_generated(
            initiative_id,
            counts.epics,
            counts.stories,
            counts.tasks,
        ));

        Ok(GenerationResult {
            success: true,
            path: output_dir,
            items_generated: counts,
            errors: Vec::new(),
            warnings: builder.warnings,
        })
    }

    /// `metadata.title` from the raw state document, falling back to the id.
    fn project_title(&self, initiative_id: &str) -> String {
        let path = InitiativeStore::new(&self.config.initiatives_dir).state_path(initiative_id);
        let state = fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_yaml::from_str::<serde_yaml::Value>(&content).ok());
        let title = state
            .as_ref()
            .and_then(|state| state.get("metadata"))
            .and_then(|metadata| metadata.get("title"))
            .and_then(serde_yaml::Value::as_str)
            .map(str::trim)
            .filter(|title| !title.is_empty());

        match title {
            Some(title) => title.to_string(),
            None => {
                tracing::debug!(
                    initiative = initiative_id,
                    path = %path.display(),
                    "no title in state, using id as project title"
                );
                initiative_id.to_string()
            }
        }
    }

    fn write_tree(
        &self,
        output_dir: &Path,
        manifest: &Manifest,
        tree: &[EpicNode],
    ) -> Result<(), WorkItemError> {
        match fs::remove_dir_all(output_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(WorkItemError::IoError {
                    path: output_dir.display().to_string(),
                    source,
                })
            }
        }
        create_dir(output_dir)?;
        write_yaml(&output_dir.join(MANIFEST_FILE), manifest)?;

        for template in [SCHEMA_TEMPLATE, README_TEMPLATE] {
            let from = self.config.workitem_templates_dir.join(template);
            if from.is_file() {
                let to = output_dir.join(template);
                fs::copy(&from, &to).map_err(|source| WorkItemError::IoError {
                    path: to.display().to_string(),
                    source,
                })?;
            }
        }

        for epic in tree {
            let epic_dir = output_dir.join(&epic.item.id);
            create_dir(&epic_dir)?;
            write_yaml(&epic_dir.join("epic.yaml"), &epic.item)?;
            for story in &epic.stories {
                let story_dir = epic_dir.join(&story.item.id);
                create_dir(&story_dir)?;
                write_yaml(&story_dir.join("story.yaml"), &story.item)?;
                for task in &story.tasks {
                    write_yaml(&story_dir.join(format!("{}.yaml", task.id)), task)?;
                }
            }
        }
        Ok(())
    }
}

/// Converts grouped source artifacts into work items.
struct ItemBuilder<'s> {
    generated_at: DateTime<Utc>,
    universal_ids: HashMap<&'s str, String>,
    warnings: Vec<String>,
}

impl<'s> ItemBuilder<'s> {
    fn build(&mut self, hierarchy: &Hierarchy<'s>) -> Vec<EpicNode> {
        let mut tree = Vec::with_capacity(hierarchy.epics.len());
        for (e, (epic, stories)) in hierarchy.epics.iter().enumerate() {
            let epic_uid = (e + 1).to_string();
            let epic_id = item_id(&epic_uid, &epic.title);

            let mut story_nodes = Vec::with_capacity(stories.len());
            for (s, (story, tasks)) in stories.iter().enumerate() {
                let story_uid = format!("{}.{}", epic_uid, s + 1);
                let story_id = item_id(&story_uid, &story.title);

                let task_items: Vec<WorkItem> = tasks
                    .iter()
                    .enumerate()
                    .map(|(t, task)| {
                        let id = item_id(&format!("{}.{}", story_uid, t + 1), &task.title);
                        self.task(task, id, &story_id)
                    })
                    .collect();
                let children = task_items.iter().map(|t| t.id.clone()).collect();
                story_nodes.push(StoryNode {
                    item: self.story(story, story_id, &epic_id, children),
                    tasks: task_items,
                });
            }

            let children = story_nodes.iter().map(|s| s.item.id.clone()).collect();
            tree.push(EpicNode {
                item: self.epic(epic, epic_id, children),
                stories: story_nodes,
            });
        }
        tree
    }

    fn base(
        &self,
        level: Level,
        kind: SourceType,
        source_path: &str,
        id: String,
        title: &str,
        description: Option<&str>,
    ) -> WorkItem {
        let label = match level {
            Level::Epic => "Epic",
            Level::Story => "Story",
            Level::Task => "Task",
        };
        WorkItem {
            meta: WorkItemMeta {
                schema_version: SCHEMA_VERSION.to_string(),
                level,
                source: SourceRef {
                    kind,
                    path: source_path.to_string(),
                },
                generated_at: self.generated_at,
            },
            id,
            title: title.to_string(),
            description: non_empty(description).unwrap_or_else(|| format!("{}: {}", label, title)),
            status: Status::Backlog,
            priority: Priority::Medium,
            created_at: self
                .generated_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: None,
            labels: Vec::new(),
            estimate: None,
            parent: None,
            children: Vec::new(),
            blocked_by: Vec::new(),
            acceptance_criteria: Vec::new(),
            success_metrics: Vec::new(),
            dependencies: Vec::new(),
            risks: Vec::new(),
            user_story: None,
            implementation_notes: None,
            affected_files: Vec::new(),
        }
    }

    fn epic(&self, epic: &SourceEpic, id: String, children: Vec<String>) -> WorkItem {
        let mut item = self.base(
            Level::Epic,
            SourceType::TierEpic,
            &epic.source_path,
            id,
            &epic.title,
            epic.description.as_deref(),
        );
        item.status = Status::from_source(epic.status.as_deref());
        item.priority = Priority::from_moscow(epic.moscow.as_deref());
        stamp(&mut item, epic.created_at.as_deref(), epic.updated_at.as_deref());
        item.labels = epic.labels.clone();
        item.estimate = non_empty(epic.complexity.as_deref()).map(|size| Estimate {
            value: EstimateValue::Size(size),
            unit: EstimateUnit::TShirt,
        });
        item.children = children;
        item.acceptance_criteria = epic.acceptance_criteria.clone();
        item.success_metrics = epic
            .success_metrics
            .iter()
            .map(|m| match m {
                EpicMetric::Text(metric) => SuccessMetric {
                    metric: metric.clone(),
                    target: String::new(),
                },
                EpicMetric::Detailed { metric, target } => SuccessMetric {
                    metric: metric.clone(),
                    target: target.clone().unwrap_or_default(),
                },
            })
            .collect();
        item.dependencies = epic
            .dependencies
            .iter()
            .map(|d| match d {
                EpicDependency::Text(description) => Dependency {
                    kind: DependencyType::External,
                    id: None,
                    description: Some(description.clone()),
                },
                EpicDependency::Detailed { kind, description } => Dependency {
                    kind: if kind.as_deref() == Some("internal") {
                        DependencyType::Internal
                    } else {
                        DependencyType::External
                    },
                    id: None,
                    description: description.clone(),
                },
            })
            .collect();
        item.risks = epic
            .risks
            .iter()
            .map(|r| match r {
                EpicRisk::Text(description) => Risk {
                    description: description.clone(),
                    mitigation: None,
                },
                EpicRisk::Detailed {
                    description,
                    mitigation,
                } => Risk {
                    description: description.clone(),
                    mitigation: mitigation.clone(),
                },
            })
            .collect();
        item
    }

    fn story(
        &mut self,
        story: &SourceStory,
        id: String,
        parent: &str,
        children: Vec<String>,
    ) -> WorkItem {
        let mut item = self.base(
            Level::Story,
            SourceType::TierStory,
            &story.source_path,
            id,
            &story.title,
            story.description.as_deref(),
        );
        item.status = Status::from_source(story.status.as_deref());
        item.priority = Priority::from_moscow(story.moscow.as_deref());
        stamp(&mut item, story.created_at.as_deref(), story.updated_at.as_deref());
        item.labels = if story.labels.is_empty() {
            story.skills_required.clone()
        } else {
            story.labels.clone()
        };
        item.estimate = estimate_from(story.story_points, EstimateUnit::Points);
        item.parent = Some(parent.to_string());
        item.children = children;
        item.blocked_by = self.resolve_dependencies(&story.id, &story.dependencies);
        item.acceptance_criteria = story.acceptance_criteria.clone();
        item.user_story = match &story.user_story {
            Some(SourceUserStory::Sentence(sentence)) => parse_user_story(sentence),
            Some(SourceUserStory::Parts {
                persona,
                want,
                benefit,
            }) => Some(UserStory {
                as_a: persona.clone().unwrap_or_default(),
                i_want: want.clone().unwrap_or_default(),
                so_that: benefit.clone().unwrap_or_default(),
            }),
            None => None,
        };
        item
    }

    fn task(&mut self, task: &SourceTask, id: String, parent: &str) -> WorkItem {
        let mut item = self.base(
            Level::Task,
            SourceType::TierTask,
            &task.source_path,
            id,
            &task.title,
            task.description.as_deref(),
        );
        item.status = Status::from_source(task.status.as_deref());
        stamp(&mut item, task.created_at.as_deref(), task.updated_at.as_deref());
        item.labels = task.skills_required.clone();
        item.estimate = estimate_from(task.estimated_hours, EstimateUnit::Hours);
        item.parent = Some(parent.to_string());
        item.blocked_by = self.resolve_dependencies(&task.id, &task.dependencies);
        item.implementation_notes = non_empty(task.implementation_notes.as_deref());
        item.affected_files = task.affected_files.clone();
        item.acceptance_criteria = task
            .test_requirements
            .iter()
            .cloned()
            .map(AcceptanceCriterion::Text)
            .collect();
        item
    }

    /// Map source ids to work-item ids; unknown references are kept verbatim.
    fn resolve_dependencies(&mut self, owner: &str, dependencies: &[String]) -> Vec<String> {
        dependencies
            .iter()
            .map(|dep| match self.universal_ids.get(dep.as_str()) {
                Some(id) => id.clone(),
                None => {
                    tracing::warn!(
                        item = owner,
                        dependency = %dep,
                        "dependency does not match any generated item"
                    );
                    self.warnings
                        .push(format!("{}: unknown dependency '{}'", owner, dep));
                    dep.clone()
                }
            })
            .collect()
    }
}

fn stamp(item: &mut WorkItem, created_at: Option<&str>, updated_at: Option<&str>) {
    if let Some(created) = non_empty(created_at) {
        item.created_at = created;
    }
    item.updated_at = non_empty(updated_at);
}

fn all_items(tree: &[EpicNode]) -> impl Iterator<Item = &WorkItem> {
    tree.iter().flat_map(|epic| {
        std::iter::once(&epic.item).chain(
            epic.stories
                .iter()
                .flat_map(|story| std::iter::once(&story.item).chain(story.tasks.iter())),
        )
    })
}

fn tree_node(item: &WorkItem, path: String, children: Vec<TreeNode>) -> TreeNode {
    TreeNode {
        id: item.id.clone(),
        title: item.title.clone(),
        slug: slugify(&item.title),
        level: item.level(),
        status: item.status,
        priority: item.priority,
        path,
        children,
    }
}

fn epic_tree_node(epic: &EpicNode) -> TreeNode {
    let epic_id = &epic.item.id;
    let stories = epic
        .stories
        .iter()
        .map(|story| {
            let story_id = &story.item.id;
            let tasks = story
                .tasks
                .iter()
                .map(|task| {
                    tree_node(
                        task,
                        format!("{}/{}/{}.yaml", epic_id, story_id, task.id),
                        Vec::new(),
                    )
                })
                .collect();
            tree_node(&story.item, format!("{}/{}/story.yaml", epic_id, story_id), tasks)
        })
        .collect();
    tree_node(&epic.item, format!("{}/epic.yaml", epic_id), stories)
}

/// Text of the PRD's problem statement section, trimmed and cut to 500 characters.
fn read_problem_statement(prd_path: &Path) -> String {
    fs::read_to_string(prd_path)
        .map(|prd| problem_statement(&prd))
        .unwrap_or_default()
}

/// Read the manifest of an initiative's generated work items.
pub fn read_manifest(config: &FlowConfig, initiative_id: &str) -> Result<Manifest, WorkItemError> {
    let path = config
        .initiative_dir(initiative_id)
        .join(WORKITEMS_DIR)
        .join(MANIFEST_FILE);
    let content = fs::read_to_string(&path).map_err(|source| WorkItemError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| WorkItemError::YamlError {
        path: path.display().to_string(),
        source,
    })
}

fn problem_statement(prd: &str) -> String {
    let Some(start) = prd.find(PROBLEM_STATEMENT) else {
        return String::new();
    };
    let body = &prd[start + PROBLEM_STATEMENT.len()..];
    let end = body.find("\n##").unwrap_or(body.len());
    body[..end].trim().chars().take(DESCRIPTION_LIMIT).collect()
}

fn create_dir(path: &Path) -> Result<(), WorkItemError> {
    fs::create_dir_all(path).map_err(|source| WorkItemError::IoError {
        path: path.display().to_string(),
        source,
    })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), WorkItemError> {
    let yaml = serde_yaml::to_string(value).map_err(|source| WorkItemError::YamlError {
        path: path.display().to_string(),
        source,
    })?;
    fs::write(path, yaml).map_err(|source| WorkItemError::IoError {
        path: path.display().to_string(),
        source,
    })
}
