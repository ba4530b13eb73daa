//! Feed, graph and config parsing, plus pipeline linting.
//!
//! Documents are JSON or YAML, chosen by file extension:
//! - `.yaml` / `.yml` go through `serde_yaml_ng`
//! - everything else goes through `serde_json`
//!
//! `validate_pipeline` reports structural problems without aborting, so the
//! CLI can list all of them at once.

use super::error::{Error, Result};
use super::graph::{NodeRole, Pipeline};
use super::types::*;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Json,
    Yaml,
}

impl DocFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

fn decode<T: DeserializeOwned>(text: &str, format: DocFormat, source_name: &str) -> Result<T> {
    let decoded = match format {
        DocFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        DocFormat::Yaml => serde_yaml_ng::from_str(text).map_err(|e| e.to_string()),
    };
    decoded.map_err(|message| Error::Parse {
        source_name: source_name.to_string(),
        message,
    })
}

fn decode_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::Parse {
        source_name: path.display().to_string(),
        message: format!("failed to read: {}", e),
    })?;
    decode(&text, DocFormat::from_path(path), &path.display().to_string())
}

/// Parse a template feed from a string.
pub fn parse_template_feed(text: &str, format: DocFormat) -> Result<Vec<TemplateRecord>> {
    decode::<TemplateFeed>(text, format, "template feed").map(TemplateFeed::into_records)
}

/// Parse a template feed from disk.
pub fn parse_template_feed_file(path: &Path) -> Result<Vec<TemplateRecord>> {
    decode_file::<TemplateFeed>(path).map(TemplateFeed::into_records)
}

/// Parse a normalized graph from a string.
pub fn parse_graph(text: &str, format: DocFormat) -> Result<GraphDocument> {
    decode(text, format, "graph")
}

/// Parse a normalized graph from disk.
pub fn parse_graph_file(path: &Path) -> Result<GraphDocument> {
    decode_file(path)
}

/// Parse generator settings from YAML (JSON is accepted as a YAML subset).
pub fn parse_generator_config(yaml: &str) -> Result<GeneratorConfig> {
    decode(yaml, DocFormat::Yaml, "generator config")
}

pub fn parse_generator_config_file(path: &Path) -> Result<GeneratorConfig> {
    decode_file(path)
}

/// Lint a loaded pipeline. Returns a list of errors (empty = valid).
pub fn validate_pipeline(pipeline: &Pipeline) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut report = |message: String| errors.push(ValidationError { message });

    for step in pipeline.steps.values().filter(|s| !s.is_root()) {
        for node in &step.nodes {
            let role = node.role();
            let here = format!("node '{}' ({}) in step '{}'", node.id, node.kind, step.id);

            if node.is_stub() && role == NodeRole::Operation {
                report(format!("{} has no template", here));
            }

            match role {
                NodeRole::Output if node.dependencies.is_empty() => {
                    report(format!("{} has no producer", here));
                }
                NodeRole::Input if node.key().is_none() => {
                    report(format!("{} has no key", here));
                }
                _ => {}
            }

            if let Some(template) = node.template.as_ref().filter(|_| !role.is_boundary()) {
                for dep in &node.dependencies {
                    if !template.has_input(&dep.target_port) {
                        report(format!(
                            "{} receives on undeclared input port '{}'",
                            here, dep.target_port
                        ));
                    }
                }
                for port in node.sources.keys() {
                    if !template.has_output(port) {
                        report(format!("{} sends from undeclared output port '{}'", here, port));
                    }
                }

                let origin_param = match node.origin() {
                    Some(Origin::Parameter(label)) => Some(label.as_str()),
                    _ => None,
                };
                for (label, param) in &node.params {
                    if let ParamType::Unknown(tag) = &param.param_type {
                        if Some(label.as_str()) != origin_param {
                            report(format!(
                                "{} has parameter '{}' of unknown type '{}'",
                                here, label, tag
                            ));
                        }
                    }
                }
            }
        }
    }

    errors
}
