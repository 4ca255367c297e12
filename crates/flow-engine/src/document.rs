// document.rs - Read-only access to an initiative's artifact files.
//
// All paths handed in and out are relative to the initiative root and use
// `/` separators. Markdown artifacts expose their YAML frontmatter as fields;
// everything else is parsed as a whole YAML document. Documents that cannot
// be read or parsed read as empty.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde_yaml::{Mapping, Value};

use crate::error::EngineError;

/// The artifact tree of one initiative.
#[derive(Debug, Clone)]
pub struct ArtifactTree {
    root: PathBuf,
}

impl ArtifactTree {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).is_file()
    }

    /// Whether the file can be opened for reading.
    pub fn is_readable(&self, relative: &str) -> bool {
        File::open(self.path(relative)).is_ok_and(|f| f.metadata().is_ok_and(|m| m.is_file()))
    }

    /// Files matching `pattern`, as sorted relative paths.
    ///
    /// `*` does not cross directory boundaries and does not match dotfiles.
    pub fn glob(&self, pattern: &str) -> Result<Vec<String>, EngineError> {
        let root = self.root.to_string_lossy().replace('\\', "/");
        let full = format!(
            "{}/{}",
            Pattern::escape(root.trim_end_matches('/')),
            pattern
        );
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: true,
        };
        let entries = glob::glob_with(&full, options).map_err(|source| {
            EngineError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        let mut matches: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .filter_map(|p| self.relative(&p))
            .collect();
        matches.sort();
        Ok(matches)
    }

    /// Top-level fields of the document at `relative`.
    pub fn fields(&self, relative: &str) -> Mapping {
        let Ok(content) = fs::read_to_string(self.path(relative)) else {
            return Mapping::new();
        };
        if relative.ends_with(".md") {
            frontmatter(&content)
                .map(parse_mapping)
                .unwrap_or_default()
        } else {
            parse_mapping(&content)
        }
    }

    fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

/// The YAML between a leading `---` line and the next `---` line.
pub fn frontmatter(content: &str) -> Option<&str> {
    let body = content.strip_prefix("---\n")?;
    let end = body.find("\n---")?;
    Some(&body[..end])
}

fn parse_mapping(content: &str) -> Mapping {
    match serde_yaml::from_str::<Value>(content) {
        Ok(Value::Mapping(map)) => map,
        Ok(_) => Mapping::new(),
        Err(e) => {
            tracing::debug!(error = %e, "unparsable artifact document, treating as empty");
            Mapping::new()
        }
    }
}

/// Whether a field value counts as empty: null, `""`, or `[]`.
pub fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Sequence(items)) => items.is_empty(),
        Some(_) => false,
    }
}
