//! Error taxonomy for loading and generation.
//!
//! Configuration errors and lookup misses are fatal and always name the
//! offending step, node, parameter or identifier. Unknown node kinds are not
//! errors at all: the loader degrades them to stub nodes.

use thiserror::Error;

/// Result alias used across the core.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort loading or generation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("node template not found: {0}")]
    TemplateNotFound(String),

    #[error("node template '{0}' is declared more than once")]
    DuplicateTemplate(String),

    #[error("step not found: {0}")]
    StepNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("duplicate node id '{id}' in step '{step}'")]
    DuplicateNode { step: String, id: String },

    #[error("step '{step}' is referenced by {referenced_by} but has no graph entry")]
    MissingStep { step: String, referenced_by: String },

    #[error("connection in step '{step}' references unknown node '{node}' ({end})")]
    UnresolvedConnection {
        step: String,
        node: String,
        end: &'static str,
    },

    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    #[error("unknown parameter type '{param_type}' for '{param}' of node '{node}' in step '{step}'")]
    UnknownParamType {
        step: String,
        node: String,
        param: String,
        param_type: String,
    },

    #[error("invalid value for '{param}' of node '{node}' in step '{step}': {reason}")]
    InvalidParamValue {
        step: String,
        node: String,
        param: String,
        reason: String,
    },

    #[error("output node '{node}' in step '{step}' has no producing node")]
    DanglingOutput { step: String, node: String },

    #[error("dependency cycle in step '{step}' involving: {}", .nodes.join(", "))]
    DependencyCycle { step: String, nodes: Vec<String> },

    #[error("node '{node}' in step '{step}' is fed by legacy Parameter node '{source_node}', which produces no value")]
    ParameterFed {
        step: String,
        node: String,
        source_node: String,
    },

    #[error("cannot parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_nodes() {
        let err = Error::DependencyCycle {
            step: "prep".to_string(),
            nodes: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("cycle"));
        assert!(msg.contains("prep"));
        assert!(msg.contains("a, b, c"));
    }

    #[test]
    fn test_unknown_param_type_names_everything() {
        let err = Error::UnknownParamType {
            step: "s1".to_string(),
            node: "n1".to_string(),
            param: "color".to_string(),
            param_type: "rgba".to_string(),
        };
        let msg = err.to_string();
        for part in ["s1", "n1", "color", "rgba"] {
            assert!(msg.contains(part), "missing {part} in {msg}");
        }
    }
}
