//! Graph loader: turns a normalized graph document into a `Pipeline`.
//!
//! Runs in fixed passes: instantiate nodes, wire intra-step connections,
//! copy proxy data onto steps, collapse Output nodes, route step inputs from
//! the root connections, then attach owning-step references.

use super::error::{Error, Result};
use super::graph::{Node, NodeRole, OutputRef, Pipeline, Step, ROOT_STEP};
use super::registry::TemplateRegistry;
use super::types::GraphDocument;

/// Build a pipeline from a graph document and a template registry.
pub fn load_pipeline(doc: &GraphDocument, registry: &TemplateRegistry) -> Result<Pipeline> {
    if !doc.contains_key(ROOT_STEP) {
        return Err(Error::MalformedGraph(format!(
            "graph has no '{}' step",
            ROOT_STEP
        )));
    }

    let mut pipeline = Pipeline::new();
    instantiate_nodes(doc, registry, &mut pipeline)?;
    wire_connections(doc, &mut pipeline)?;
    attach_step_data(&mut pipeline)?;
    collapse_outputs(&mut pipeline);
    route_step_inputs(doc, &mut pipeline)?;
    attach_owners(&mut pipeline);

    tracing::info!(
        steps = pipeline.steps.len() - 1,
        nodes = pipeline.nodes.len(),
        "pipeline loaded"
    );
    Ok(pipeline)
}

/// Clone a template per node record; unknown kinds become stubs.
fn instantiate_nodes(
    doc: &GraphDocument,
    registry: &TemplateRegistry,
    pipeline: &mut Pipeline,
) -> Result<()> {
    for (step_id, record) in doc {
        if !pipeline.steps.contains_key(step_id) {
            pipeline
                .steps
                .insert(step_id.clone(), Step::new(step_id));
        }
        for node_record in &record.nodes {
            let mut node = if registry.contains(&node_record.kind) {
                registry.clone_node(&node_record.kind)?
            } else {
                tracing::warn!(
                    step = %step_id,
                    node = %node_record.id,
                    kind = %node_record.kind,
                    "no template for node kind, emitting a stub"
                );
                Node::stub(&node_record.kind)
            };
            node.apply_record(node_record);
            pipeline.add_node(step_id, node)?;
        }
        tracing::debug!(step = %step_id, nodes = record.nodes.len(), "instantiated step nodes");
    }
    Ok(())
}

fn wire_connections(doc: &GraphDocument, pipeline: &mut Pipeline) -> Result<()> {
    for (step_id, record) in doc {
        let step = pipeline.get_step_mut(step_id)?;
        for conn in &record.connections {
            step.add_connection(conn)?;
        }
    }
    Ok(())
}

/// Copy each root proxy's authored data onto the step it stands for.
fn attach_step_data(pipeline: &mut Pipeline) -> Result<()> {
    let proxies: Vec<_> = pipeline
        .root()
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.record.clone()))
        .collect();
    for (id, record) in proxies {
        let step = pipeline
            .steps
            .get_mut(&id)
            .ok_or_else(|| Error::MissingStep {
                step: id.clone(),
                referenced_by: "a root proxy node".to_string(),
            })?;
        if let Some(record) = record {
            step.set_data(&record);
        }
    }
    Ok(())
}

/// Reduce Output nodes to their `key` and index them on the owning step.
fn collapse_outputs(pipeline: &mut Pipeline) {
    for step in pipeline.steps.values_mut() {
        for (idx, node) in step.nodes.iter_mut().enumerate() {
            if node.role() != NodeRole::Output {
                continue;
            }
            node.strip_to_key();
            if let Some(key) = node.key() {
                step.outputs.insert(key, idx);
            }
        }
    }
}

/// Route every root connection to the target step's Input node.
fn route_step_inputs(doc: &GraphDocument, pipeline: &mut Pipeline) -> Result<()> {
    for conn in &doc[ROOT_STEP].connections {
        for id in [&conn.source, &conn.target] {
            if !pipeline.steps.contains_key(id) {
                return Err(Error::MissingStep {
                    step: id.clone(),
                    referenced_by: "a root connection".to_string(),
                });
            }
        }

        let source = pipeline.get_step(&conn.source)?;
        if !source.outputs.contains_key(&conn.source_output) {
            tracing::warn!(
                step = %conn.source,
                key = %conn.source_output,
                "root connection reads an output key the step does not declare"
            );
        }

        let origin = OutputRef {
            step: conn.source.clone(),
            key: conn.source_output.clone(),
        };
        let target = pipeline.get_step_mut(&conn.target)?;
        if !target.set_input_origin(&conn.target_input, origin) {
            tracing::warn!(
                step = %conn.target,
                key = %conn.target_input,
                "root connection feeds an input key with no Input node"
            );
        }
    }
    Ok(())
}

fn attach_owners(pipeline: &mut Pipeline) {
    for (id, step) in pipeline.steps.iter_mut() {
        for node in &mut step.nodes {
            node.step = Some(id.clone());
        }
    }
}
