//! Tree-query access to YAML configuration documents.
//!
//! The calibration loaders never look at YAML syntax directly. They open a
//! [`YamlDocument`] and walk it through [`Node`] handles offering typed
//! lookup (`as_f64`, `as_i32`), a presence check (`is_defined`) and the
//! array length (`size`). Every failure is reported as a
//! [`PerceptionIoError`] that names the document and the dotted key.

use crate::error::PerceptionIoError;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use yaml_rust::{Yaml, YamlLoader};

static BAD_VALUE: Yaml = Yaml::BadValue;

/// A parsed, non-empty YAML document together with the path it came from.
#[derive(Debug)]
pub struct YamlDocument {
    path: PathBuf,
    root: Yaml,
}

/// Borrowed view of one node in a [`YamlDocument`].
#[derive(Debug, Clone)]
pub struct Node<'a> {
    yaml: &'a Yaml,
    path: &'a Path,
    key: String,
}

impl YamlDocument {
    /// Loads the first document of the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// * [`PerceptionIoError::NotFound`] if `path` does not exist.
    /// * [`PerceptionIoError::IOError`] if the file exists but cannot be read.
    /// * [`PerceptionIoError::InvalidFormat`] if the file is not valid YAML or
    ///   holds an empty/null document.
    pub fn load(path: &Path) -> Result<Self, PerceptionIoError> {
        if !path.exists() {
            return Err(PerceptionIoError::NotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)?;
        Self::parse(path, &contents)
    }

    /// Parses `contents` as if it had been read from `path`.
    pub fn parse(path: &Path, contents: &str) -> Result<Self, PerceptionIoError> {
        let docs = YamlLoader::load_from_str(contents).map_err(|e| {
            PerceptionIoError::InvalidFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        match docs.into_iter().next() {
            Some(root) if !root.is_null() && !root.is_badvalue() => Ok(YamlDocument {
                path: path.to_path_buf(),
                root,
            }),
            _ => Err(PerceptionIoError::InvalidFormat {
                path: path.to_path_buf(),
                reason: "empty document".to_string(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> Node<'_> {
        Node {
            yaml: &self.root,
            path: &self.path,
            key: String::new(),
        }
    }

    /// Shorthand for `self.root().get(key)`.
    pub fn get(&self, key: &str) -> Node<'_> {
        self.root().get(key)
    }
}

impl<'a> Node<'a> {
    /// Child node under `key`. Missing keys yield an undefined node rather
    /// than an error so that presence can be checked with [`Node::is_defined`].
    pub fn get(&self, key: &str) -> Node<'a> {
        let parent: &'a Yaml = self.yaml;
        Node {
            yaml: &parent[key],
            path: self.path,
            key: self.child_key(key),
        }
    }

    /// Element `index` of a sequence node; out of range yields an undefined node.
    pub fn at(&self, index: usize) -> Node<'a> {
        let yaml = match self.yaml {
            Yaml::Array(items) => items.get(index).unwrap_or(&BAD_VALUE),
            _ => &BAD_VALUE,
        };
        Node {
            yaml,
            path: self.path,
            key: format!("{}[{}]", self.key, index),
        }
    }

    pub fn is_defined(&self) -> bool {
        !self.yaml.is_badvalue()
    }

    /// Number of elements in a sequence or mapping, zero for scalars.
    pub fn size(&self) -> usize {
        match self.yaml {
            Yaml::Array(items) => items.len(),
            Yaml::Hash(map) => map.len(),
            _ => 0,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the node as a floating-point scalar.
    ///
    /// Integers are widened and numeric strings are parsed, so `1920`,
    /// `1920.0` and `"1920"` all succeed.
    pub fn as_f64(&self) -> Result<f64, PerceptionIoError> {
        self.check_defined()?;
        let value = match self.yaml {
            Yaml::Real(_) => self.yaml.as_f64(),
            Yaml::Integer(i) => Some(*i as f64),
            Yaml::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.ok_or_else(|| self.bad_conversion("a floating-point number"))
    }

    /// Reads the node as a 32-bit integer scalar.
    pub fn as_i32(&self) -> Result<i32, PerceptionIoError> {
        self.check_defined()?;
        let value = match self.yaml {
            Yaml::Integer(i) => i32::try_from(*i).ok(),
            Yaml::String(s) => s.trim().parse::<i32>().ok(),
            _ => None,
        };
        value.ok_or_else(|| self.bad_conversion("a 32-bit integer"))
    }

    /// Reads a sequence node element by element as floating-point values.
    pub fn as_f64_vec(&self) -> Result<Vec<f64>, PerceptionIoError> {
        self.check_defined()?;
        if !matches!(self.yaml, Yaml::Array(_)) {
            return Err(self.bad_conversion("a sequence"));
        }
        (0..self.size()).map(|i| self.at(i).as_f64()).collect()
    }

    fn child_key(&self, key: &str) -> String {
        if self.key.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.key, key)
        }
    }

    fn check_defined(&self) -> Result<(), PerceptionIoError> {
        if self.is_defined() {
            Ok(())
        } else {
            Err(PerceptionIoError::parse(
                self.path,
                format!("field `{}` is missing", self.key),
            ))
        }
    }

    fn bad_conversion(&self, expected: &str) -> PerceptionIoError {
        PerceptionIoError::parse(
            self.path,
            format!(
                "field `{}` is not {expected} (found {})",
                self.key,
                describe(self.yaml)
            ),
        )
    }
}

fn describe(yaml: &Yaml) -> String {
    match yaml {
        Yaml::Real(s) => format!("real `{s}`"),
        Yaml::Integer(i) => format!("integer `{i}`"),
        Yaml::String(s) => format!("string `{s}`"),
        Yaml::Boolean(b) => format!("boolean `{b}`"),
        Yaml::Array(items) => format!("sequence of {}", items.len()),
        Yaml::Hash(_) => "mapping".to_string(),
        Yaml::Alias(_) => "alias".to_string(),
        Yaml::Null => "null".to_string(),
        Yaml::BadValue => "nothing".to_string(),
    }
}

/// Serializes `value` to YAML and writes it to `path`, creating parent
/// directories as needed.
pub fn write_yaml_file<T: Serialize>(path: &Path, value: &T) -> Result<(), PerceptionIoError> {
    let yaml_string = serde_yaml::to_string(value)?;
    write_text_file(path, &yaml_string)
}

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write_text_file(path: &Path, contents: &str) -> Result<(), PerceptionIoError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                PerceptionIoError::IOError(format!(
                    "Failed to create directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }

    let mut file = fs::File::create(path)
        .map_err(|e| PerceptionIoError::IOError(format!("{}: {e}", path.display())))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| PerceptionIoError::IOError(format!("{}: {e}", path.display())))?;

    Ok(())
}

/// Rejects empty paths before any filesystem access takes place.
pub(crate) fn require_path(path: &Path) -> Result<(), PerceptionIoError> {
    if path.as_os_str().is_empty() {
        return Err(PerceptionIoError::InvalidArgument(
            "path must not be empty".to_string(),
        ));
    }
    Ok(())
}
