//! Fragment store: the on-disk template library.
//!
//! Templates live in category directories under a templates root:
//!
//! ```text
//! templates/
//!   01_targets/      cpu_a.yml.tera
//!   01_variables/    host.yml.tera
//!   01_inputs/       ds.yml.tera
//!   02_panels/       cpu.yml.tera
//!   03_rows/         system.yml.tera
//!   04_dashboards/   overview.yml.tera
//! ```
//!
//! The numeric prefix is a display aid for humans browsing the tree; the
//! authoritative pipeline order is [`Category::ALL`]. A directory is
//! recognized by the category name after its first `_` (or the bare name),
//! anything else is skipped with a warning.
//!
//! File stems name the fragment; the extension before the `.tera` suffix
//! declares the source format (`.yml`/`.yaml`/`.json`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};
use walkdir::WalkDir;

use crate::core::Error;
use crate::tree::Format;
use crate::utils;

/// Suffix marking a file as a template source.
pub const TEMPLATE_SUFFIX: &str = ".tera";

/// Pipeline category of a fragment.
///
/// Variant order is the dependency order: a fragment may only reference
/// categories declared before its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Targets,
    Variables,
    Inputs,
    Panels,
    Rows,
    Dashboards,
}

impl Category {
    /// All categories in pipeline (dependency) order.
    pub const ALL: [Category; 6] = [
        Category::Targets,
        Category::Variables,
        Category::Inputs,
        Category::Panels,
        Category::Rows,
        Category::Dashboards,
    ];

    /// The category name used in config targets and template contexts.
    pub fn name(self) -> &'static str {
        match self {
            Category::Targets => "targets",
            Category::Variables => "variables",
            Category::Inputs => "inputs",
            Category::Panels => "panels",
            Category::Rows => "rows",
            Category::Dashboards => "dashboards",
        }
    }

    /// Directory name under the templates root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Targets => "01_targets",
            Category::Variables => "01_variables",
            Category::Inputs => "01_inputs",
            Category::Panels => "02_panels",
            Category::Rows => "03_rows",
            Category::Dashboards => "04_dashboards",
        }
    }

    /// Resolve a category from its bare name.
    pub fn from_name(name: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Resolve a category from a directory name, tolerating any ordering
    /// prefix before the first underscore (`01_targets`, `2_panels`,
    /// `targets`).
    pub fn from_dir_name(dir: &str) -> Option<Self> {
        Category::from_name(dir)
            .or_else(|| dir.split_once('_').and_then(|(_, rest)| Category::from_name(rest)))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One named template unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub category: Category,
    pub name: String,
    /// Format the rendered output is parsed as.
    pub format: Format,
    /// Raw template source text.
    pub source: String,
}

/// In-memory fragment library, read-only during a build run.
#[derive(Debug, Clone, Default)]
pub struct FragmentStore {
    categories: BTreeMap<Category, BTreeMap<String, Fragment>>,
}

impl FragmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every fragment under `root`.
    ///
    /// Fails with [`Error::FragmentConflict`] when two files map to the same
    /// `(category, name)` — e.g. `cpu.yml.tera` next to `cpu.yaml.tera`.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let mut store = Self::new();
        let mut sources: BTreeMap<(Category, String), PathBuf> = BTreeMap::new();

        for entry in WalkDir::new(root).min_depth(2).max_depth(2).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::TemplateDir {
                path: root.to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(dir) = entry.path().parent().and_then(|p| p.file_name()).and_then(|n| n.to_str())
            else {
                continue;
            };
            let Some(category) = Category::from_dir_name(dir) else {
                tracing::warn!("skipping unrecognized template directory '{dir}'");
                continue;
            };
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((name, format)) = split_template_name(file_name) else {
                tracing::debug!("skipping non-template file {}", entry.path().display());
                continue;
            };

            let source = std::fs::read_to_string(entry.path()).map_err(|e| Error::TemplateDir {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;

            let key = (category, name.to_string());
            if let Some(first) = sources.get(&key) {
                return Err(Error::FragmentConflict {
                    category,
                    name: name.to_string(),
                    first: first.clone(),
                    second: entry.path().to_path_buf(),
                });
            }
            sources.insert(key, entry.path().to_path_buf());
            store.insert(Fragment {
                category,
                name: name.to_string(),
                format,
                source,
            });
        }

        tracing::debug!("loaded {} fragments from {}", store.len(), root.display());
        Ok(store)
    }

    /// Write every fragment under `root`, creating all category directories.
    ///
    /// Each file is written atomically; existing fragments with the same
    /// name are overwritten.
    pub fn save(&self, root: &Path) -> Result<(), Error> {
        for category in Category::ALL {
            let dir = root.join(category.dir_name());
            utils::fs::ensure_dir(&dir).map_err(|e| Error::Write {
                path: dir.clone(),
                message: format!("{e:#}"),
            })?;
        }
        for fragment in self.iter() {
            let file_name = format!(
                "{}.{}{}",
                fragment.name,
                match fragment.format {
                    Format::Json => "json",
                    Format::Yaml => "yml",
                },
                TEMPLATE_SUFFIX
            );
            let path = root.join(fragment.category.dir_name()).join(file_name);
            utils::fs::atomic_write(&path, fragment.source.as_bytes()).map_err(|e| {
                Error::Write {
                    path: path.clone(),
                    message: format!("{e:#}"),
                }
            })?;
        }
        Ok(())
    }

    /// Insert a fragment, returning the previous one under the same
    /// `(category, name)` if any.
    pub fn insert(&mut self, fragment: Fragment) -> Option<Fragment> {
        self.categories
            .entry(fragment.category)
            .or_default()
            .insert(fragment.name.clone(), fragment)
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&Fragment> {
        self.categories.get(&category).and_then(|m| m.get(name))
    }

    /// Fragments of one category in name order.
    pub fn fragments(&self, category: Category) -> impl Iterator<Item = &Fragment> {
        self.categories.get(&category).into_iter().flat_map(|m| m.values())
    }

    /// All fragments, categories in pipeline order, names sorted.
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.categories.values().flat_map(|m| m.values())
    }

    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `cpu.yml.tera` into `("cpu", Format::Yaml)`.
fn split_template_name(file_name: &str) -> Option<(&str, Format)> {
    let stem = file_name.strip_suffix(TEMPLATE_SUFFIX)?;
    let (name, ext) = stem.rsplit_once('.')?;
    if name.is_empty() {
        return None;
    }
    Format::from_extension(ext).map(|format| (name, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_template(root: &Path, dir: &str, file: &str, content: &str) {
        let dir = root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn category_order_is_pipeline_order() {
        assert!(Category::Targets < Category::Panels);
        assert!(Category::Panels < Category::Rows);
        assert!(Category::Rows < Category::Dashboards);
    }

    #[test]
    fn dir_name_prefix_is_display_only() {
        assert_eq!(Category::from_dir_name("01_targets"), Some(Category::Targets));
        assert_eq!(Category::from_dir_name("99_targets"), Some(Category::Targets));
        assert_eq!(Category::from_dir_name("targets"), Some(Category::Targets));
        assert_eq!(Category::from_dir_name("01_bogus"), None);
    }

    #[test]
    fn split_template_name_variants() {
        assert_eq!(split_template_name("cpu.yml.tera"), Some(("cpu", Format::Yaml)));
        assert_eq!(split_template_name("cpu.yaml.tera"), Some(("cpu", Format::Yaml)));
        assert_eq!(split_template_name("cpu.json.tera"), Some(("cpu", Format::Json)));
        assert_eq!(split_template_name("cpu.yml"), None);
        assert_eq!(split_template_name("README.md"), None);
    }

    #[test]
    fn load_discovers_fragments() {
        let temp = TempDir::new().unwrap();
        write_template(temp.path(), "01_targets", "cpu_a.yml.tera", "expr: up\n");
        write_template(temp.path(), "04_dashboards", "main.yml.tera", "title: Main\n");
        write_template(temp.path(), "notes", "README.md", "not a template");

        let store = FragmentStore::load(temp.path()).unwrap();
        assert_eq!(store.len(), 2);
        let frag = store.get(Category::Targets, "cpu_a").unwrap();
        assert_eq!(frag.format, Format::Yaml);
        assert_eq!(frag.source, "expr: up\n");
        assert!(store.get(Category::Dashboards, "main").is_some());
    }

    #[test]
    fn load_rejects_duplicate_names() {
        let temp = TempDir::new().unwrap();
        write_template(temp.path(), "02_panels", "cpu.yml.tera", "a: 1\n");
        write_template(temp.path(), "02_panels", "cpu.yaml.tera", "a: 2\n");

        let err = FragmentStore::load(temp.path()).unwrap_err();
        match err {
            Error::FragmentConflict { category, name, .. } => {
                assert_eq!(category, Category::Panels);
                assert_eq!(name, "cpu");
            }
            other => panic!("expected FragmentConflict, got {other}"),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let mut store = FragmentStore::new();
        store.insert(Fragment {
            category: Category::Variables,
            name: "host".to_string(),
            format: Format::Yaml,
            source: "name: host\n".to_string(),
        });
        store.save(temp.path()).unwrap();

        // every category directory exists, even empty ones
        for category in Category::ALL {
            assert!(temp.path().join(category.dir_name()).is_dir());
        }

        let loaded = FragmentStore::load(temp.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(Category::Variables, "host").unwrap().source, "name: host\n");
    }
}
