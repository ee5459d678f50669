//! YAML manifest: templates, navigation graph, recovery sequence and tasks
//!
//! Template image paths are resolved relative to the manifest file. Every
//! cross reference is checked here, so an engine is only ever built from a
//! consistent manifest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use action_flow::{Engine, EngineConfig, Task};
use action_primitives::{Action, Controller};
use anyhow::{bail, Context, Result};
use nav_graph::{Edge, MatchMode, NavGraph, Node};
use perceiver_visual::{Region, Template, TemplateSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn default_threshold() -> f64 {
    0.8
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSpec {
    pub name: String,
    pub image: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub name: String,
    pub templates: Vec<String>,
    #[serde(default)]
    pub match_mode: MatchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
    pub action: Action,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub delay_ms: u64,
}

/// Manifest file as written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    #[serde(default)]
    pub templates: Vec<TemplateSpec>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub recovery: Vec<Action>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Manifest with images decoded and references checked
#[derive(Debug, Clone)]
pub struct Manifest {
    pub source: PathBuf,
    pub templates: TemplateSet,
    pub graph: NavGraph,
    pub recovery: Vec<Action>,
    pub tasks: Vec<Task>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let manifest = Self::parse(&content, base)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;

        info!(
            manifest = %path.display(),
            templates = manifest.templates.len(),
            nodes = manifest.graph.node_count(),
            edges = manifest.graph.edge_count(),
            tasks = manifest.tasks.len(),
            "manifest loaded"
        );
        Ok(Self {
            source: path.to_path_buf(),
            ..manifest
        })
    }

    /// Parse manifest text; relative image paths are joined onto `base`
    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let file: ManifestFile = serde_yaml::from_str(content).context("Malformed manifest YAML")?;
        Self::build(file, base)
    }

    pub fn build(file: ManifestFile, base: &Path) -> Result<Self> {
        let mut templates = TemplateSet::default();
        for spec in file.templates {
            let template = load_template(&spec, base)?;
            templates.insert(template)?;
        }

        let mut graph = NavGraph::new();
        for spec in file.nodes {
            if let Some(missing) = spec.templates.iter().find(|t| !templates.contains(t)) {
                bail!("node {} references unknown template {}", spec.name, missing);
            }
            let node = Node::new(spec.name.clone(), spec.templates).with_match_mode(spec.match_mode);
            graph
                .add_node(node)
                .with_context(|| format!("Invalid node {}", spec.name))?;
        }

        for spec in file.edges {
            let context = format!("edge {} -> {}", spec.from, spec.to);
            let from = graph
                .node_id(&spec.from)
                .with_context(|| format!("{}: unknown node {}", context, spec.from))?;
            let to = graph
                .node_id(&spec.to)
                .with_context(|| format!("{}: unknown node {}", context, spec.to))?;
            check_template_ref(&spec.action, &templates, &context)?;

            let edge = Edge::new(from, to, spec.action)
                .with_weight(spec.weight)
                .with_delay(Duration::from_millis(spec.delay_ms));
            graph.add_edge(edge).with_context(|| format!("Invalid {}", context))?;
        }

        for action in &file.recovery {
            check_template_ref(action, &templates, "recovery")?;
        }

        let mut names = HashSet::new();
        for task in &file.tasks {
            if !names.insert(task.name.as_str()) {
                bail!("duplicate task {}", task.name);
            }
            if let Some(target) = &task.target {
                if graph.node_id(target).is_none() {
                    bail!("task {} targets unknown node {}", task.name, target);
                }
            }
            let context = format!("task {}", task.name);
            for step in &task.steps {
                check_template_ref(&step.action, &templates, &context)?;
            }
        }

        Ok(Self {
            source: base.to_path_buf(),
            templates,
            graph,
            recovery: file.recovery,
            tasks: file.tasks,
        })
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name == name)
    }

    /// Build an engine for one device from this manifest
    pub fn engine<C: Controller>(&self, controller: Arc<C>, config: EngineConfig) -> Engine<C> {
        Engine::new(controller, self.templates.clone(), self.graph.clone())
            .with_config(config)
            .with_recovery(self.recovery.clone())
    }
}

fn load_template(spec: &TemplateSpec, base: &Path) -> Result<Template> {
    let path = if spec.image.is_absolute() {
        spec.image.clone()
    } else {
        base.join(&spec.image)
    };
    let image = image::open(&path)
        .with_context(|| format!("template {}: cannot open {}", spec.name, path.display()))?;
    debug!(template = %spec.name, path = %path.display(), "template image decoded");

    let mut template = Template::new(spec.name.clone(), image, spec.threshold)?;
    if let Some(region) = spec.region {
        template = template.with_region(region);
    }
    for tag in &spec.tags {
        template = template.with_tag(tag.clone());
    }
    Ok(template)
}

fn check_template_ref(action: &Action, templates: &TemplateSet, context: &str) -> Result<()> {
    if let Some(template) = action.template() {
        if !templates.contains(template) {
            bail!("{} references unknown template {}", context, template);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_parse_from_yaml() {
        let file: ManifestFile = serde_yaml::from_str(
            r#"
edges:
  - from: a
    to: b
    action: { type: click, x: 3, y: 4 }
  - from: b
    to: a
    action: { type: key_press, key: back }
    weight: 2.5
    delay_ms: 300
  - from: a
    to: c
    action: { type: swipe, start: [10, 100], end: [10, -20], duration_ms: 250 }
"#,
        )
        .unwrap();

        assert_eq!(file.edges.len(), 3);
        assert_eq!(file.edges[0].action, Action::Click { x: 3, y: 4 });
        assert_eq!(file.edges[0].weight, 1.0);
        assert_eq!(file.edges[1].delay_ms, 300);
        assert!(matches!(file.edges[2].action, Action::Swipe(ref g) if g.end == (10, -20)));
    }

    #[test]
    fn test_unknown_node_in_edge_is_rejected() {
        let file: ManifestFile = serde_yaml::from_str(
            r#"
edges:
  - from: a
    to: b
    action: { type: click, x: 0, y: 0 }
"#,
        )
        .unwrap();
        let err = Manifest::build(file, Path::new(".")).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown node a"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(Manifest::parse("nodez: []", Path::new(".")).is_err());
    }
}
