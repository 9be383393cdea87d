//! Graph error types.

use crate::graph::PortRef;
use crate::resource::ResourceKind;

/// Errors raised while building, compiling or executing a render graph.
///
/// Every variant except [`GraphError::PassExecutionFailure`] is a structural
/// configuration error: it is deterministic given the graph description and
/// names the offending pass, port or edge.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// No factory is registered under this pass type name.
    #[error("unknown pass type '{0}'")]
    UnknownPassType(String),
    /// A pass with this identifier already exists in the graph.
    #[error("pass identifier '{0}' is already used")]
    DuplicateIdentifier(String),
    /// The identifier is empty or contains the `.` separator.
    #[error("invalid pass identifier '{0}'")]
    InvalidIdentifier(String),
    /// A port reference is not of the form `<pass>.<port>`.
    #[error("invalid port reference '{0}', expected '<pass>.<port>'")]
    InvalidReference(String),
    /// The referenced pass does not exist.
    #[error("unknown pass '{0}'")]
    UnknownPass(String),
    /// The pass exists but declares no such port.
    #[error("pass '{pass}' has no port named '{port}'")]
    UnknownPort { pass: String, port: String },
    /// A pass declared two ports with the same name.
    #[error("pass '{pass}' declares port '{port}' more than once")]
    DuplicatePortName { pass: String, port: String },
    /// The port was used where an output is required.
    #[error("'{0}' is not an output port")]
    NotAnOutputPort(PortRef),
    /// The port was used where an input is required.
    #[error("'{0}' is not an input port")]
    NotAnInputPort(PortRef),
    /// The two ports carry incompatible resource kinds.
    #[error("cannot bind '{src}' ({src_kind}) to '{dst}' ({dst_kind})")]
    PortKindMismatch {
        src: PortRef,
        src_kind: ResourceKind,
        dst: PortRef,
        dst_kind: ResourceKind,
    },
    /// The destination input already has an incoming edge.
    #[error("input '{dst}' is already bound to '{existing}'")]
    DuplicateInputBinding { dst: PortRef, existing: PortRef },
    /// A required input has no incoming edge.
    #[error("required input '{0}' is not connected")]
    UnconnectedInput(PortRef),
    /// The dependency graph is not a DAG.
    #[error("render graph contains a cycle through: {}", .passes.join(", "))]
    CyclicGraph { passes: Vec<String> },
    /// No output port has been marked.
    #[error("render graph has no marked output")]
    NoOutputMarked,
    /// A configuration record contains an option the pass type does not know.
    #[error("pass type '{pass_type}' does not recognize option '{option}'")]
    UnrecognizedOption { pass_type: String, option: String },
    /// An option has the wrong value type or an out-of-range value.
    #[error("option '{option}' of pass type '{pass_type}' expects {expected}")]
    InvalidOptionValue {
        pass_type: String,
        option: String,
        expected: String,
    },
    /// The plan was compiled from a different graph or an older revision.
    #[error(
        "plan for '{plan_graph}' at revision {plan_revision} does not match \
         graph '{graph}' at revision {graph_revision}"
    )]
    StalePlan {
        plan_graph: String,
        plan_revision: u64,
        graph: String,
        graph_revision: u64,
    },
    /// A pass failed inside its `execute` behavior.
    #[error("pass '{pass}' failed: {cause}")]
    PassExecutionFailure {
        pass: String,
        #[source]
        cause: PassError,
    },
}

impl GraphError {
    /// Whether this error describes a configuration problem rather than a runtime fault.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::PassExecutionFailure { .. })
    }
}

/// Errors a pass reports from [`RenderPass::execute`](crate::RenderPass::execute).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    /// Nothing is bound to the requested port.
    #[error("no resource bound to port '{0}'")]
    MissingResource(String),
    /// The bound resource is not of the expected type.
    #[error("port '{port}' holds a {found}, expected a {expected}")]
    WrongResourceType {
        port: String,
        expected: &'static str,
        found: &'static str,
    },
    /// Input and output dimensions disagree.
    #[error("port '{port}' is {found_width}x{found_height}, expected {width}x{height}")]
    ResolutionMismatch {
        port: String,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
    /// Any other failure inside the pass.
    #[error("{0}")]
    Failed(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;
