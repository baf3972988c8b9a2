//! Dependency-ordered rendering pipeline.
//!
//! One pipeline run renders every fragment for one datasource, walking the
//! categories in their fixed order (targets, variables, inputs, panels,
//! rows, dashboards). Each completed fragment is added to the context
//! immediately, so a fragment can reference anything from earlier categories
//! and earlier-sorted names in its own category. Referencing a later
//! category is a dependency error, caught at render time when the lookup
//! comes back undefined.
//!
//! Datasource runs are independent — each owns a private [`Context`] — so
//! the build fans them out over a bounded pool of blocking workers. One
//! datasource failing never aborts its siblings; failures are collected and
//! reported per datasource.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::StreamExt;
use indicatif::ProgressBar;

use crate::config::BuildConfig;
use crate::core::Error;
use crate::render::{TemplateError, TemplateRenderer};
use crate::store::{Category, FragmentStore};
use crate::tree::{Format, Node};

/// Rendered fragments of one pipeline run, keyed by category then name.
pub type Rendered = BTreeMap<Category, BTreeMap<String, Node>>;

/// The data a template can see while rendering.
///
/// Owned exclusively by one pipeline run; every category key exists from the
/// start (initially empty) so an out-of-order reference fails as a missing
/// name inside a known category rather than a missing map.
#[derive(Debug, Clone)]
pub struct Context {
    pub datasource: String,
    pub labels: Vec<String>,
    pub rendered: Rendered,
}

impl Context {
    pub fn new(datasource: String, labels: Vec<String>) -> Self {
        let rendered =
            Category::ALL.into_iter().map(|category| (category, BTreeMap::new())).collect();
        Self {
            datasource,
            labels,
            rendered,
        }
    }

    /// Record one rendered fragment, making it visible to later renders.
    pub fn insert_rendered(&mut self, category: Category, name: String, node: Node) {
        self.rendered.entry(category).or_default().insert(name, node);
    }

    pub fn into_rendered(self) -> Rendered {
        self.rendered
    }

    /// Convert to a tera context with `datasource`, `labels`, `rendered`.
    pub(crate) fn to_tera(&self) -> tera::Context {
        let mut ctx = tera::Context::new();
        ctx.insert("datasource", &self.datasource);
        ctx.insert("labels", &self.labels);
        ctx.insert("rendered", &self.rendered);
        ctx
    }

    /// Every dotted path currently defined, for did-you-mean suggestions.
    pub(crate) fn variable_paths(&self) -> Vec<String> {
        let mut paths = vec!["datasource".to_string(), "labels".to_string()];
        for (category, fragments) in &self.rendered {
            for name in fragments.keys() {
                paths.push(format!("rendered.{category}.{name}"));
            }
        }
        paths
    }
}

/// Render every fragment for one datasource, in dependency order.
pub fn run_datasource(
    store: &FragmentStore,
    renderer: &TemplateRenderer,
    datasource: &str,
    labels: &[String],
) -> Result<Rendered, Error> {
    let mut context = Context::new(datasource.to_string(), labels.to_vec());
    for category in Category::ALL {
        for fragment in store.fragments(category) {
            tracing::debug!("rendering {category}/{} for {datasource}", fragment.name);
            let node = renderer
                .render(fragment, &context)
                .map_err(|e| classify_render_error(category, &fragment.name, e))?;
            context.insert_rendered(category, fragment.name.clone(), node);
        }
    }
    Ok(context.into_rendered())
}

/// Promote an undefined-name error into a dependency error when the missing
/// path points at a category that renders later than the current one.
fn classify_render_error(category: Category, name: &str, err: TemplateError) -> Error {
    if let TemplateError::VariableNotFound { variable, .. } = &err {
        let mut segments = variable.split('.');
        if segments.next() == Some("rendered") {
            if let Some(referenced) = segments.next().and_then(Category::from_name) {
                if referenced > category {
                    return Error::Dependency {
                        category,
                        name: name.to_string(),
                        reference: variable.clone(),
                        referenced,
                    };
                }
            }
        }
    }
    Error::Template {
        category,
        name: name.to_string(),
        source: err,
    }
}

/// One output document of a build.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub format: Format,
    pub datasource: String,
    pub target: Category,
    pub name: String,
    pub node: Node,
}

/// Everything a build produced: artifacts from the datasources that
/// succeeded, one error per datasource that failed.
#[derive(Debug)]
pub struct BuildReport {
    pub artifacts: Vec<BuildArtifact>,
    pub failures: Vec<(String, Error)>,
}

/// Run the pipeline for every configured datasource.
///
/// Datasources render concurrently on up to `max_parallel` blocking
/// workers. Artifact order is deterministic regardless of completion
/// order: config datasource order, then format, then target category, then
/// fragment name. Fragment names starting with `_` are private — rendered
/// into context, never emitted.
pub async fn build(
    store: Arc<FragmentStore>,
    config: Arc<BuildConfig>,
    renderer: Arc<TemplateRenderer>,
    max_parallel: usize,
    progress: Option<ProgressBar>,
) -> Result<BuildReport, Error> {
    let targets = config.target_categories()?;
    let max_parallel = max_parallel.max(1);

    let datasources: Vec<String> = config.datasource.clone();
    let mut stream = futures::stream::iter(datasources.into_iter().map(|datasource| {
        let store = Arc::clone(&store);
        let renderer = Arc::clone(&renderer);
        let labels = config.labels.clone();
        async move {
            let name = datasource.clone();
            let handle = tokio::task::spawn_blocking(move || {
                run_datasource(&store, &renderer, &datasource, &labels)
            });
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::Internal(format!("render worker for '{name}' died: {e}"))),
            };
            (name, result)
        }
    }))
    .buffer_unordered(max_parallel);

    let mut results: BTreeMap<String, Rendered> = BTreeMap::new();
    let mut failures: Vec<(String, Error)> = Vec::new();
    while let Some((datasource, result)) = stream.next().await {
        if let Some(bar) = &progress {
            bar.inc(1);
        }
        match result {
            Ok(rendered) => {
                tracing::info!("rendered datasource {datasource}");
                results.insert(datasource, rendered);
            }
            Err(error) => {
                tracing::error!("datasource {datasource} failed: {error}");
                failures.push((datasource, error));
            }
        }
    }
    drop(stream);

    let mut artifacts = Vec::new();
    for datasource in &config.datasource {
        let Some(rendered) = results.get(datasource) else {
            continue;
        };
        for format in &config.output_format {
            for target in &targets {
                let Some(fragments) = rendered.get(target) else {
                    continue;
                };
                for (name, node) in fragments {
                    if name.starts_with('_') {
                        continue;
                    }
                    artifacts.push(BuildArtifact {
                        format: *format,
                        datasource: datasource.clone(),
                        target: *target,
                        name: name.clone(),
                        node: node.clone(),
                    });
                }
            }
        }
    }
    failures.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(BuildReport {
        artifacts,
        failures,
    })
}
