//! Graph validation (SPEC_FULL.md §4.1, §9 "cyclic dependencies").

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::graph::NodeDef;
use crate::types::{GraphRef, NodeKind, NodeName};

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("graph {graph_ref} already registered with a different definition")]
    #[diagnostic(
        code(loomgraph::graph::mismatch),
        help("register a new version instead of redefining an existing (name, version) pair")
    )]
    GraphMismatch { graph_ref: GraphRef },

    #[error("node `{node}` depends on unknown node `{dependency}`")]
    #[diagnostic(code(loomgraph::graph::unknown_dependency))]
    UnknownDependency { node: NodeName, dependency: NodeName },

    #[error("node `{node}` depends on itself")]
    #[diagnostic(code(loomgraph::graph::self_dependency))]
    SelfDependency { node: NodeName },

    #[error("mutate node `{node}` targets unknown node `{target}`")]
    #[diagnostic(code(loomgraph::graph::unknown_mutate_target))]
    UnknownMutateTarget { node: NodeName, target: NodeName },

    #[error("mutate node `{node}` targets input node `{target}`, inputs cannot be mutated")]
    #[diagnostic(code(loomgraph::graph::mutate_target_is_input))]
    MutateTargetIsInput { node: NodeName, target: NodeName },

    #[error("non-input node `{node}` has no function")]
    #[diagnostic(code(loomgraph::graph::missing_function))]
    MissingFunction { node: NodeName },

    #[error("graph contains a dependency cycle through node `{node}`")]
    #[diagnostic(
        code(loomgraph::graph::cycle),
        help("break the cycle in the upstream predicate DAG")
    )]
    Cycle { node: NodeName },
}

pub fn validate(
    graph_ref: &GraphRef,
    nodes: &FxHashMap<NodeName, NodeDef>,
    order: &[NodeName],
) -> Result<(), GraphError> {
    for name in order {
        let def = &nodes[name];

        if def.kind.computes_own_value() || matches!(def.kind, NodeKind::Mutate) {
            if def.function.is_none() {
                return Err(GraphError::MissingFunction { node: name.clone() });
            }
        }

        for dep in def.dependencies() {
            if &dep == name {
                return Err(GraphError::SelfDependency { node: name.clone() });
            }
            if !nodes.contains_key(&dep) {
                return Err(GraphError::UnknownDependency {
                    node: name.clone(),
                    dependency: dep,
                });
            }
        }

        if let Some(target) = &def.mutates {
            match nodes.get(target) {
                None => {
                    return Err(GraphError::UnknownMutateTarget {
                        node: name.clone(),
                        target: target.clone(),
                    })
                }
                Some(target_def) if target_def.kind.is_input() => {
                    return Err(GraphError::MutateTargetIsInput {
                        node: name.clone(),
                        target: target.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    detect_cycle(nodes, order)?;

    let _ = graph_ref; // identity-level mismatch is checked by the registry, not here
    Ok(())
}

/// Depth-first cycle detection over the dependency DAG (`node -> dependency`
/// edges). Kept dependency-free by default; the `petgraph-compat` feature
/// swaps in `petgraph`'s `is_cyclic_directed` for callers who already
/// depend on it and want a single cycle-detection implementation shared
/// across their codebase.
fn detect_cycle(nodes: &FxHashMap<NodeName, NodeDef>, order: &[NodeName]) -> Result<(), GraphError> {
    #[cfg(feature = "petgraph-compat")]
    {
        crate::graphs::petgraph_compat::detect_cycle(nodes, order)
    }
    #[cfg(not(feature = "petgraph-compat"))]
    {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: FxHashMap<&NodeName, Mark> = FxHashMap::default();

        fn visit<'a>(
            name: &'a NodeName,
            nodes: &'a FxHashMap<NodeName, NodeDef>,
            marks: &mut FxHashMap<&'a NodeName, Mark>,
            stack: &mut FxHashSet<&'a NodeName>,
        ) -> Result<(), GraphError> {
            match marks.get(name) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => {
                    return Err(GraphError::Cycle { node: name.clone() })
                }
                None => {}
            }
            marks.insert(name, Mark::Visiting);
            stack.insert(name);
            for dep in nodes[name].dependencies() {
                if let Some(dep_name) = nodes.get_key_value(&dep).map(|(k, _)| k) {
                    visit(dep_name, nodes, marks, stack)?;
                }
            }
            stack.remove(name);
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut stack = FxHashSet::default();
        for name in order {
            visit(name, nodes, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}
