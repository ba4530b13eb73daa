//! Side-channel parameter table: every indirected parameter, per step, with
//! its value coerced to the type the run-time loader hands out.

use crate::core::error::{Error, Result};
use crate::core::graph::{Node, Pipeline};
use crate::core::types::{json_value_to_string, Param, ParamType};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// step name → loader label → value
pub type ParamTable = IndexMap<String, IndexMap<String, Value>>;

/// Collect the table for every step, in root proxy order. Steps without
/// indirected parameters are left out.
pub fn build_param_table(pipeline: &Pipeline) -> Result<ParamTable> {
    let mut table = ParamTable::new();
    for id in pipeline.step_ids() {
        let step = pipeline.get_step(&id)?;
        let mut entries = IndexMap::new();
        for node in &step.nodes {
            entries.extend(label_params(node, &step.id)?);
        }
        if !entries.is_empty() {
            table.insert(step.name.clone(), entries);
        }
    }
    Ok(table)
}

/// One node's contribution: loader label → coerced value.
pub fn label_params(node: &Node, step: &str) -> Result<IndexMap<String, Value>> {
    let mut out = IndexMap::new();
    for (label, param) in &node.params {
        if let Some(loader_label) = &param.indirection {
            let value = coerce(param).map_err(|reason| invalid(node, step, label, reason))?;
            let value = value.ok_or_else(|| Error::UnknownParamType {
                step: step.to_string(),
                node: node.id.clone(),
                param: label.clone(),
                param_type: param.param_type.to_string(),
            })?;
            out.insert(loader_label.clone(), value);
        }
    }
    Ok(out)
}

/// `Ok(None)` for an unknown type tag.
fn coerce(param: &Param) -> std::result::Result<Option<Value>, String> {
    let value = &param.value;
    let coerced = match &param.param_type {
        ParamType::String
        | ParamType::Option
        | ParamType::OptionOfOptions
        | ParamType::Description => value.clone(),
        ParamType::Number => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| format!("'{}' is not a number", json_value_to_string(value)))?;
            Number::from_f64(n)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a finite number", n))?
        }
        ParamType::Boolean => Value::Bool(json_value_to_string(value).to_lowercase() == "true"),
        ParamType::List => Value::Array(list_items(value)?.into_iter().cloned().collect()),
        ParamType::Map => {
            let flat: Map<String, Value> = map_entries(value)?
                .into_iter()
                .map(|(k, v)| (k, v.clone()))
                .collect();
            Value::Object(flat)
        }
        ParamType::Unknown(_) => return Ok(None),
    };
    Ok(Some(coerced))
}

/// Elements of a `list` value. Unset means empty.
pub fn list_items(value: &Value) -> std::result::Result<Vec<&Value>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().collect()),
        other => Err(format!("expected a list, got {}", other)),
    }
}

/// Ordered `{key, value}` records of a `map` value. Unset means empty.
pub fn map_entries(value: &Value) -> std::result::Result<Vec<(String, &Value)>, String> {
    let records = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(records) => records,
        other => return Err(format!("expected a list of {{key, value}} records, got {}", other)),
    };
    records
        .iter()
        .map(|record| match (record.get("key"), record.get("value")) {
            (Some(k), Some(v)) => Ok((json_value_to_string(k), v)),
            _ => Err(format!("map entry {} is not a {{key, value}} record", record)),
        })
        .collect()
}

pub(crate) fn invalid(node: &Node, step: &str, label: &str, reason: String) -> Error {
    Error::InvalidParamValue {
        step: step.to_string(),
        node: node.id.clone(),
        param: label.to_string(),
        reason,
    }
}
