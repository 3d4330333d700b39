//! Explicit dependency graph between derived values.
//!
//! Each node declares its upstream nodes. When a node changes, `affected`
//! yields every transitive dependent in topological order, which is the
//! order in which they must be invalidated or recomputed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("{node} depends on undeclared node {dependency}")]
    UnknownDependency { node: String, dependency: String },
    #[error("dependency cycle through {0}")]
    Cycle(String),
}

#[derive(Debug, Clone)]
pub struct DependencyGraph<N> {
    order: Vec<N>,
    dependents: HashMap<N, Vec<N>>,
}

impl<N: Copy + Eq + Hash + Debug> DependencyGraph<N> {
    /// Build from `(node, upstream)` declarations. Ties in the topological
    /// order are broken by declaration order.
    pub fn new(declarations: &[(N, &[N])]) -> Result<Self, GraphError> {
        let declared: HashSet<N> = declarations.iter().map(|(n, _)| *n).collect();
        let mut dependents: HashMap<N, Vec<N>> = HashMap::new();
        let mut indegree: HashMap<N, usize> = HashMap::new();

        for (node, upstream) in declarations {
            indegree.entry(*node).or_insert(0);
            for dep in upstream.iter() {
                if !declared.contains(dep) {
                    return Err(GraphError::UnknownDependency {
                        node: format!("{:?}", node),
                        dependency: format!("{:?}", dep),
                    });
                }
                dependents.entry(*dep).or_default().push(*node);
                *indegree.entry(*node).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<N> = declarations
            .iter()
            .map(|(n, _)| *n)
            .filter(|n| indegree.get(n) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(declarations.len());
        while let Some(node) = queue.pop_front() {
            order.push(node);
            for next in dependents.get(&node).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(next) {
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(*next);
                    }
                }
            }
        }

        if order.len() < declared.len() {
            let stuck = declarations
                .iter()
                .map(|(n, _)| *n)
                .find(|n| !order.contains(n));
            return Err(GraphError::Cycle(format!("{:?}", stuck)));
        }
        Ok(DependencyGraph { order, dependents })
    }

    /// All nodes, upstream before downstream.
    pub fn order(&self) -> &[N] {
        &self.order
    }

    /// Transitive dependents of `changed`, in topological order, excluding `changed`.
    pub fn affected(&self, changed: N) -> Vec<N> {
        let mut reached: HashSet<N> = HashSet::new();
        let mut stack = vec![changed];
        while let Some(node) = stack.pop() {
            for next in self.dependents.get(&node).into_iter().flatten() {
                if reached.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        self.order
            .iter()
            .copied()
            .filter(|n| reached.contains(n))
            .collect()
    }

    pub fn depends_on(&self, node: N, upstream: N) -> bool {
        self.affected(upstream).contains(&node)
    }
}
