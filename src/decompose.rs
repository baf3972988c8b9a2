//! Dashboard decomposition: the convert direction.
//!
//! Walks an existing dashboard tree, classifies each subtree by structural
//! role, and extracts every classified subtree into a named fragment with
//! placeholders standing in for the datasource literal, the declared label
//! selector, and already-extracted child fragments. The resulting library,
//! rebuilt by the pipeline with the same datasource and labels, reproduces
//! the original document exactly.
//!
//! Classification is top-down (a panel is a panel because of where it sits
//! and what it contains), emission is bottom-up (targets before their panel,
//! panels before their row, everything before the dashboard) so inner
//! fragments exist before outer ones reference them.
//!
//! The whole store is built and validated in memory; callers persist it with
//! [`FragmentStore::save`] only after decomposition succeeded, so a failed
//! convert never leaves a partial library behind.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::Error;
use crate::render::filters::{Dialect, label_selector};
use crate::store::{Category, Fragment, FragmentStore};
use crate::tree::{Format, Node};

/// Structural role of a subtree, over a closed set of shapes.
///
/// New shapes are added here and matched where lists are walked, instead of
/// threading ad hoc structural probes through the recursion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Row,
    Panel,
    Target,
    Variable,
    Input,
    Unclassified,
}

impl Shape {
    /// Classify an element of a dashboard's (or row's) `panels` list.
    ///
    /// A row is marked by `type: row` or by carrying a non-empty nested
    /// `panels` list of its own.
    pub fn of_panel_entry(node: &Node) -> Shape {
        if !node.is_mapping() {
            return Shape::Unclassified;
        }
        let is_row = node.get("type").and_then(Node::as_str) == Some("row")
            || node.get("panels").and_then(Node::as_sequence).is_some_and(|p| !p.is_empty());
        if is_row { Shape::Row } else { Shape::Panel }
    }

    /// Classify an element of a panel's query `targets` list.
    pub fn of_target_entry(node: &Node) -> Shape {
        if node.is_mapping() { Shape::Target } else { Shape::Unclassified }
    }

    /// Classify an entry of the `templating.list` field.
    pub fn of_variable_entry(node: &Node) -> Shape {
        if node.is_mapping() { Shape::Variable } else { Shape::Unclassified }
    }

    /// Classify an entry of the `__inputs` field.
    pub fn of_input_entry(node: &Node) -> Shape {
        if node.is_mapping() { Shape::Input } else { Shape::Unclassified }
    }
}

/// Decompose one dashboard into a fragment library.
///
/// `datasource` and `labels` name the literal values to parameterize: every
/// occurrence of the datasource string becomes `@{ datasource }@`, and the
/// label set's selector clause (in the datasource's dialect) becomes a
/// `label_selector(...)` call.
pub fn decompose(
    dashboard: &Node,
    datasource: &str,
    labels: &[String],
) -> Result<FragmentStore, Error> {
    if !dashboard.is_mapping() {
        return Err(Error::Parse {
            context: "dashboard document".to_string(),
            message: "root must be a mapping".to_string(),
        });
    }

    let dialect = Dialect::for_name(datasource);
    if dialect.is_none() {
        tracing::warn!(
            "datasource '{datasource}' matches no known dialect; label selectors will not be parameterized"
        );
    }
    let selector_needle = dialect
        .filter(|_| !labels.is_empty())
        .map(|d| label_selector(d, labels))
        .filter(|needle| !needle.is_empty());

    let decomposer = Decomposer {
        datasource: datasource.to_string(),
        selector_needle,
        store: FragmentStore::new(),
        anon_panels: 0,
    };
    decomposer.run(dashboard.clone())
}

struct Decomposer {
    datasource: String,
    /// The concrete selector clause to parameterize, present when the
    /// datasource maps to a known dialect and labels were declared.
    selector_needle: Option<String>,
    store: FragmentStore,
    /// Counter for panels with no title, uid, or id.
    anon_panels: usize,
}

impl Decomposer {
    fn run(mut self, mut root: Node) -> Result<FragmentStore, Error> {
        // the dashboard name comes from the untouched title
        let dashboard_name = root
            .get("title")
            .and_then(Node::as_str)
            .map(slug)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "dashboard".to_string());

        if let Some(list) = root
            .get_mut("templating")
            .and_then(|t| t.get_mut("list"))
            .and_then(Node::as_sequence_mut)
        {
            for (index, entry) in list.iter_mut().enumerate() {
                if Shape::of_variable_entry(entry) != Shape::Variable {
                    continue;
                }
                let name = entry
                    .get("name")
                    .and_then(Node::as_str)
                    .map(slug)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("var_{index}"));
                let name = self.emit(Category::Variables, name, entry, "Variable")?;
                *entry = reference(Category::Variables, &name, 4);
            }
        }

        if let Some(list) = root.get_mut("__inputs").and_then(Node::as_sequence_mut) {
            for (index, entry) in list.iter_mut().enumerate() {
                if Shape::of_input_entry(entry) != Shape::Input {
                    continue;
                }
                let name = entry
                    .get("name")
                    .or_else(|| entry.get("pluginId"))
                    .and_then(Node::as_str)
                    .map(slug)
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("input_{index}"));
                let name = self.emit(Category::Inputs, name, entry, "Datasource input")?;
                *entry = reference(Category::Inputs, &name, 2);
            }
        }

        if let Some(panels) = root.get_mut("panels").and_then(Node::as_sequence_mut) {
            self.walk_panels(panels)?;
        }

        self.emit(Category::Dashboards, dashboard_name, &root, "Dashboard")?;
        Ok(self.store)
    }

    /// Extract every panel and row from a `panels` list, replacing each with
    /// a reference placeholder. Recurses into row panels first so inner
    /// fragments exist before the row that references them.
    fn walk_panels(&mut self, panels: &mut Vec<Node>) -> Result<(), Error> {
        for (index, panel) in panels.iter_mut().enumerate() {
            let shape = Shape::of_panel_entry(panel);
            if shape == Shape::Unclassified {
                tracing::debug!("leaving unclassified panel entry {index} inline");
                continue;
            }
            let name = self.panel_name(panel);

            if let Some(targets) = panel.get_mut("targets").and_then(Node::as_sequence_mut) {
                for (target_index, target) in targets.iter_mut().enumerate() {
                    if Shape::of_target_entry(target) != Shape::Target {
                        continue;
                    }
                    let target_name = target
                        .get("refId")
                        .and_then(Node::as_str)
                        .map(slug)
                        .filter(|s| !s.is_empty())
                        .map(|ref_id| format!("{name}_{ref_id}"))
                        .unwrap_or_else(|| format!("{name}_t{target_index}"));
                    let target_name =
                        self.emit(Category::Targets, target_name, target, "Query")?;
                    *target = reference(Category::Targets, &target_name, 2);
                }
            }

            match shape {
                Shape::Row => {
                    if let Some(sub) = panel.get_mut("panels").and_then(Node::as_sequence_mut) {
                        self.walk_panels(sub)?;
                    }
                    let name = self.emit(Category::Rows, name, panel, "Row")?;
                    *panel = reference(Category::Rows, &name, 2);
                }
                _ => {
                    let name = self.emit(Category::Panels, name, panel, "Panel")?;
                    *panel = reference(Category::Panels, &name, 2);
                }
            }
        }
        Ok(())
    }

    /// Deterministic panel/row name: title, then uid, then id, then a
    /// running anonymous counter.
    fn panel_name(&mut self, panel: &Node) -> String {
        if let Some(name) =
            panel.get("title").and_then(Node::as_str).map(slug).filter(|s| !s.is_empty())
        {
            return name;
        }
        if let Some(name) =
            panel.get("uid").and_then(Node::as_str).map(slug).filter(|s| !s.is_empty())
        {
            return name;
        }
        if let Some(id) = panel.get("id").and_then(Node::as_i64) {
            return format!("panel_{id}");
        }
        self.anon_panels += 1;
        format!("panel_{}", self.anon_panels)
    }

    /// Parameterize a subtree, serialize it, and add it to the store.
    ///
    /// Structurally identical fragments deduplicate into one; a structurally
    /// different fragment under an already-taken name is a
    /// [`Error::NameCollision`].
    fn emit(
        &mut self,
        category: Category,
        name: String,
        node: &Node,
        kind: &str,
    ) -> Result<String, Error> {
        let mut node = node.clone();
        parameterize(&mut node, &self.datasource, self.selector_needle.as_deref());
        let body = node.to_text(Format::Yaml)?;
        let source = format!("# {kind} template: {name}\n{}", unquote_placeholders(&body));

        if let Some(existing) = self.store.get(category, &name) {
            if existing.source == source {
                tracing::debug!("deduplicated identical fragment {category}/{name}");
                return Ok(name);
            }
            return Err(Error::NameCollision { category, name });
        }
        self.store.insert(Fragment {
            category,
            name: name.clone(),
            format: Format::Yaml,
            source,
        });
        Ok(name)
    }
}

/// Replace the label-selector clause and the datasource literal in every
/// string scalar. Reference placeholders inserted by earlier extraction
/// steps are left untouched.
fn parameterize(node: &mut Node, datasource: &str, selector_needle: Option<&str>) {
    match node {
        Node::String(s) => {
            if s.starts_with("@{ rendered[") {
                return;
            }
            if let Some(needle) = selector_needle {
                if s.contains(needle) {
                    *s = s
                        .replace(needle, "@{ label_selector(dialect=datasource, labels=labels) }@");
                }
            }
            if !datasource.is_empty() && s.contains(datasource) {
                *s = s.replace(datasource, "@{ datasource }@");
            }
        }
        Node::Sequence(items) => {
            for item in items {
                parameterize(item, datasource, selector_needle);
            }
        }
        Node::Mapping(entries) => {
            for (_, value) in entries {
                parameterize(value, datasource, selector_needle);
            }
        }
        _ => {}
    }
}

/// Reference placeholder splicing a previously extracted fragment back in
/// at the given indent column.
fn reference(category: Category, name: &str, width: usize) -> Node {
    Node::String(format!(
        "@{{ rendered[\"{}\"][\"{}\"] | to_nice_yaml | indent(width={}) }}@",
        category.name(),
        name,
        width
    ))
}

static QUOTED_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(@\{[^'\n]*\}@)'|"(@\{[^"\n]*\}@)""#).expect("placeholder regex is valid")
});

/// Strip the YAML quotes around scalars that are exactly one template
/// expression.
///
/// The emitter quotes scalars beginning with `@` (a reserved YAML
/// indicator); whole-scalar expressions must be unquoted so the engine's
/// output is spliced as raw YAML. Expressions embedded inside a longer
/// scalar keep their quotes and render as plain string values.
fn unquote_placeholders(text: &str) -> String {
    QUOTED_PLACEHOLDER
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string()).unwrap_or_default()
        })
        .into_owned()
}

/// Lowercase a display name into a filesystem- and template-safe slug.
fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}
