//! Dependency closure and wave construction

use super::types::OrchestratorError;
use crate::phase::PhaseRegistry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Static phase -> dependencies table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    deps: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

impl DependencyMap {
    pub fn new(deps: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self { deps }
    }

    /// Direct dependencies of a phase; empty when it has none
    pub fn deps_of<'a>(&'a self, phase: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.deps
            .get(phase)
            .into_iter()
            .flat_map(|deps| deps.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Fail on the first cycle found in the table
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        match self.find_cycle() {
            Some(cycle) => Err(OrchestratorError::DependencyCycle(cycle)),
            None => Ok(()),
        }
    }

    /// A cycle as a closed path (`[a, b, a]`), if the table has one
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut state: HashMap<&str, Visit> = HashMap::new();
        let mut stack: Vec<&str> = Vec::new();

        for start in self.deps.keys() {
            if let Some(cycle) = self.visit(start, &mut state, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn visit<'a>(
        &'a self,
        node: &'a str,
        state: &mut HashMap<&'a str, Visit>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match state.get(node) {
            Some(Visit::Done) => return None,
            Some(Visit::InProgress) => {
                let start = stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            None => {}
        }

        state.insert(node, Visit::InProgress);
        stack.push(node);
        for dep in self.deps_of(node) {
            if let Some(cycle) = self.visit(dep, state, stack) {
                return Some(cycle);
            }
        }
        stack.pop();
        state.insert(node, Visit::Done);
        None
    }

    /// Expand a request to its transitive dependency closure.
    ///
    /// Names the registry doesn't know are logged and dropped. The result is
    /// in registry order.
    pub fn resolve_closure(&self, requested: &[String], registry: &PhaseRegistry) -> Vec<String> {
        let mut resolved: BTreeSet<String> = requested.iter().cloned().collect();

        loop {
            let missing: Vec<String> = resolved
                .iter()
                .flat_map(|phase| self.deps_of(phase))
                .filter(|dep| !resolved.contains(*dep))
                .map(str::to_string)
                .collect();
            if missing.is_empty() {
                break;
            }
            for dep in missing {
                tracing::debug!(phase = %dep, "adding dependency to run");
                resolved.insert(dep);
            }
        }

        let mut known: Vec<String> = resolved
            .into_iter()
            .filter(|name| {
                let found = registry.contains(name);
                if !found {
                    tracing::warn!(phase = %name, "dropping unknown phase");
                }
                found
            })
            .collect();
        registry.sort_names(&mut known);
        known
    }
}

/// Split a dependency-closed set into waves.
///
/// A phase is ready once every dependency that is part of the run has
/// completed in an earlier wave. Input order is kept within each wave. If
/// nothing is ready while phases remain, the remainder runs as one final wave.
pub fn build_waves(phases: &[String], deps: &DependencyMap) -> Vec<Vec<String>> {
    let run_set: BTreeSet<&str> = phases.iter().map(String::as_str).collect();
    let mut completed: BTreeSet<&str> = BTreeSet::new();
    let mut remaining: Vec<&str> = phases.iter().map(String::as_str).collect();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (mut ready, blocked): (Vec<&str>, Vec<&str>) = remaining.into_iter().partition(|phase| {
            deps.deps_of(phase)
                .filter(|dep| run_set.contains(dep))
                .all(|dep| completed.contains(dep))
        });

        if ready.is_empty() {
            tracing::warn!(
                phases = ?blocked,
                "no phase is ready, running the remainder as one wave"
            );
            ready = blocked;
            remaining = Vec::new();
        } else {
            remaining = blocked;
        }

        completed.extend(ready.iter().copied());
        waves.push(ready.into_iter().map(str::to_string).collect());
    }

    waves
}
