//! Linearization of interface conformances.
//!
//! Default implementations and condition blocks are collected by walking the
//! conformance graph depth-first in declaration order. Each interface is
//! visited once even when it is reachable through several paths.

use crate::sema::ty::InterfaceType;
use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    sync::Arc,
};
use thiserror::Error;
use tracing::trace;

/// Depth-first pre-order over `direct` and their ancestors, without duplicates.
pub fn linearize(direct: &[Arc<InterfaceType>]) -> Vec<Arc<InterfaceType>> {
    fn visit(
        interface: &Arc<InterfaceType>,
        seen: &mut HashSet<String>,
        order: &mut Vec<Arc<InterfaceType>>,
    ) {
        if !seen.insert(interface.id()) {
            return;
        }
        order.push(Arc::clone(interface));
        for parent in interface.conformances() {
            visit(parent, seen, order);
        }
    }

    let mut seen = HashSet::new();
    let mut order = Vec::new();
    for interface in direct {
        visit(interface, &mut seen, &mut order);
    }
    order
}

/// Finds a conformance cycle through `start`, given the declared parents of
/// each interface ID. Returns the IDs along the cycle, `start` at both ends.
pub fn find_cycle<F>(start: &str, parents: F) -> Option<Vec<String>>
where
    F: Fn(&str) -> Vec<String>,
{
    fn walk<F>(
        current: &str,
        target: &str,
        parents: &F,
        path: &mut Vec<String>,
        seen: &mut HashSet<String>,
    ) -> bool
    where
        F: Fn(&str) -> Vec<String>,
    {
        for parent in parents(current) {
            path.push(parent.clone());
            if parent == target {
                return true;
            }
            if seen.insert(parent.clone()) && walk(&parent, target, parents, path, seen) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = vec![start.to_string()];
    let mut seen = HashSet::new();
    walk(start, start, &parents, &mut path, &mut seen).then_some(path)
}

/// What a single type declares for a function, by itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeclaredFunction {
    pub has_pre_conditions: bool,
    pub has_post_conditions: bool,
    pub has_implementation: bool,
}

/// Lookup of functions declared directly on a type.
pub trait FunctionDeclarations {
    fn declared_function(&self, type_id: &str, function: &str) -> Option<DeclaredFunction>;
}

/// The effective behaviour of a function on a concrete type.
///
/// Entries are IDs of the declaring types, in execution order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionResolution {
    pub type_id: String,
    pub function: String,
    pub pre_conditions: Vec<String>,
    pub post_conditions: Vec<String>,
    pub implementation: Option<String>,
    /// Interfaces whose default implementation competes with the chosen one.
    pub conflicting_defaults: Vec<String>,
}

impl FunctionResolution {
    pub fn is_declared(&self) -> bool {
        self.implementation.is_some()
            || !self.pre_conditions.is_empty()
            || !self.post_conditions.is_empty()
    }
}

#[derive(Clone, Debug)]
enum ResolutionState {
    CollectingAncestors,
    OrderingConditions,
    Bound(Arc<FunctionResolution>),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("resolution of `{function}` on `{type_id}` re-entered while {state}")]
    Reentrant {
        type_id: String,
        function: String,
        state: &'static str,
    },
}

/// Caches one [`FunctionResolution`] per concrete type and function name.
#[derive(Debug, Default)]
pub struct ConformanceResolver {
    cache: RefCell<HashMap<(String, String), ResolutionState>>,
}

impl ConformanceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        type_id: &str,
        conformances: &[Arc<InterfaceType>],
        function: &str,
        declarations: &dyn FunctionDeclarations,
    ) -> Result<Arc<FunctionResolution>, ResolutionError> {
        let key = (type_id.to_string(), function.to_string());
        if let Some(state) = self.cache.borrow().get(&key) {
            return match state {
                ResolutionState::Bound(resolution) => Ok(Arc::clone(resolution)),
                ResolutionState::CollectingAncestors => Err(ResolutionError::Reentrant {
                    type_id: key.0,
                    function: key.1,
                    state: "collecting ancestors",
                }),
                ResolutionState::OrderingConditions => Err(ResolutionError::Reentrant {
                    type_id: key.0,
                    function: key.1,
                    state: "ordering conditions",
                }),
            };
        }

        self.transition(&key, ResolutionState::CollectingAncestors);
        let ancestors: Vec<(String, DeclaredFunction)> = linearize(conformances)
            .iter()
            .filter_map(|interface| {
                let id = interface.id();
                declarations
                    .declared_function(&id, function)
                    .map(|declared| (id, declared))
            })
            .collect();

        self.transition(&key, ResolutionState::OrderingConditions);
        let own = declarations.declared_function(type_id, function);
        let resolution = Arc::new(order_conditions(
            type_id,
            function,
            conformances,
            own,
            &ancestors,
        ));

        self.transition(&key, ResolutionState::Bound(Arc::clone(&resolution)));
        Ok(resolution)
    }

    fn transition(&self, key: &(String, String), state: ResolutionState) {
        trace!(
            type_id = %key.0,
            function = %key.1,
            state = match &state {
                ResolutionState::CollectingAncestors => "collecting-ancestors",
                ResolutionState::OrderingConditions => "ordering-conditions",
                ResolutionState::Bound(_) => "bound",
            },
            "function resolution"
        );
        self.cache.borrow_mut().insert(key.clone(), state);
    }
}

fn order_conditions(
    type_id: &str,
    function: &str,
    conformances: &[Arc<InterfaceType>],
    own: Option<DeclaredFunction>,
    ancestors: &[(String, DeclaredFunction)],
) -> FunctionResolution {
    let mut pre_conditions: Vec<String> = ancestors
        .iter()
        .filter(|(_, declared)| declared.has_pre_conditions)
        .map(|(id, _)| id.clone())
        .collect();
    let own = own.unwrap_or_default();
    if own.has_pre_conditions {
        pre_conditions.push(type_id.to_string());
    }

    let mut post_conditions = Vec::new();
    if own.has_post_conditions {
        post_conditions.push(type_id.to_string());
    }
    post_conditions.extend(
        ancestors
            .iter()
            .rev()
            .filter(|(_, declared)| declared.has_post_conditions)
            .map(|(id, _)| id.clone()),
    );

    let defaults: Vec<&String> = ancestors
        .iter()
        .filter(|(_, declared)| declared.has_implementation)
        .map(|(id, _)| id)
        .collect();

    let (implementation, conflicting_defaults) = if own.has_implementation {
        (Some(type_id.to_string()), Vec::new())
    } else {
        match defaults.split_first() {
            Some((chosen, rest)) => {
                let chosen_ancestors = ancestors_of(chosen, conformances);
                let conflicts = rest
                    .iter()
                    .filter(|other| !chosen_ancestors.contains(**other))
                    .map(|other| (*other).clone())
                    .collect();
                (Some((*chosen).clone()), conflicts)
            }
            None => (None, Vec::new()),
        }
    };

    FunctionResolution {
        type_id: type_id.to_string(),
        function: function.to_string(),
        pre_conditions,
        post_conditions,
        implementation,
        conflicting_defaults,
    }
}

fn ancestors_of(id: &str, conformances: &[Arc<InterfaceType>]) -> HashSet<String> {
    linearize(conformances)
        .into_iter()
        .find(|interface| interface.id() == id)
        .map(|interface| {
            linearize(interface.conformances())
                .iter()
                .map(|ancestor| ancestor.id())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{ast::CompositeKind, location::Location};

    struct Table(HashMap<(String, String), DeclaredFunction>);

    impl FunctionDeclarations for Table {
        fn declared_function(&self, type_id: &str, function: &str) -> Option<DeclaredFunction> {
            self.0
                .get(&(type_id.to_string(), function.to_string()))
                .copied()
        }
    }

    fn id(name: &str) -> String {
        Location::script("test").type_id(name)
    }

    fn interface(name: &str, parents: Vec<Arc<InterfaceType>>) -> Arc<InterfaceType> {
        let interface = Arc::new(InterfaceType::new(
            Location::script("test"),
            name,
            CompositeKind::Structure,
        ));
        interface.set_conformances(parents);
        interface
    }

    fn conditions_everywhere(names: &[&str]) -> Table {
        let both = DeclaredFunction {
            has_pre_conditions: true,
            has_post_conditions: true,
            has_implementation: false,
        };
        Table(
            names
                .iter()
                .map(|name| ((id(name), "test".to_string()), both))
                .collect(),
        )
    }

    /// A: B; B: C, D; C: E, F; D: F
    fn diamond() -> Vec<Arc<InterfaceType>> {
        let f = interface("F", vec![]);
        let e = interface("E", vec![]);
        let d = interface("D", vec![f.clone()]);
        let c = interface("C", vec![e, f]);
        let b = interface("B", vec![c, d]);
        vec![b]
    }

    #[test]
    fn linearization_is_depth_first_pre_order() {
        let order: Vec<String> = linearize(&diamond())
            .iter()
            .map(|interface| interface.qualified_identifier.to_string())
            .collect();
        assert_eq!(order, vec!["B", "C", "E", "F", "D"]);
    }

    #[test]
    fn diamond_condition_order() {
        let table = conditions_everywhere(&["A", "B", "C", "D", "E", "F"]);
        let resolver = ConformanceResolver::new();
        let resolution = resolver
            .resolve(&id("A"), &diamond(), "test", &table)
            .expect("resolution");

        let names = |ids: &[String]| -> Vec<String> {
            ids.iter()
                .map(|id| id.trim_start_matches("S.test.").to_string())
                .collect()
        };
        assert_eq!(names(&resolution.pre_conditions), ["B", "C", "E", "F", "D", "A"]);
        assert_eq!(names(&resolution.post_conditions), ["A", "D", "F", "E", "C", "B"]);
        assert_eq!(resolution.implementation, None);
    }

    #[test]
    fn resolution_is_cached() {
        let table = conditions_everywhere(&["B"]);
        let resolver = ConformanceResolver::new();
        let first = resolver.resolve(&id("A"), &diamond(), "test", &table).unwrap();
        let second = resolver.resolve(&id("A"), &diamond(), "test", &table).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn first_default_wins_and_concrete_overrides() {
        let a = interface("A", vec![]);
        let b = interface("B", vec![a.clone()]);
        let mut table = Table(HashMap::new());
        let default = DeclaredFunction {
            has_implementation: true,
            ..DeclaredFunction::default()
        };
        table.0.insert((id("A"), "test".into()), default);
        table.0.insert((id("B"), "test".into()), default);

        let resolver = ConformanceResolver::new();
        let resolution = resolver.resolve(&id("S"), &[b.clone()], "test", &table).unwrap();
        assert_eq!(resolution.implementation, Some(id("B")));
        assert!(resolution.conflicting_defaults.is_empty());

        table.0.insert((id("S"), "test".into()), default);
        let resolver = ConformanceResolver::new();
        let resolution = resolver.resolve(&id("S"), &[b], "test", &table).unwrap();
        assert_eq!(resolution.implementation, Some(id("S")));
    }

    #[test]
    fn default_reached_through_two_paths_is_not_a_conflict() {
        let a = interface("A", vec![]);
        let b = interface("B", vec![a.clone()]);
        let c = interface("C", vec![a]);
        let mut table = Table(HashMap::new());
        table.0.insert(
            (id("A"), "test".into()),
            DeclaredFunction {
                has_implementation: true,
                ..DeclaredFunction::default()
            },
        );
        let resolution = ConformanceResolver::new()
            .resolve(&id("D"), &[b, c], "test", &table)
            .unwrap();
        assert_eq!(resolution.implementation, Some(id("A")));
        assert!(resolution.conflicting_defaults.is_empty());
    }

    #[test]
    fn unrelated_defaults_conflict() {
        let a = interface("A", vec![]);
        let b = interface("B", vec![]);
        let default = DeclaredFunction {
            has_implementation: true,
            ..DeclaredFunction::default()
        };
        let mut table = Table(HashMap::new());
        table.0.insert((id("A"), "test".into()), default);
        table.0.insert((id("B"), "test".into()), default);
        let resolution = ConformanceResolver::new()
            .resolve(&id("S"), &[a, b], "test", &table)
            .unwrap();
        assert_eq!(resolution.implementation, Some(id("A")));
        assert_eq!(resolution.conflicting_defaults, vec![id("B")]);
    }

    #[test]
    fn detects_cycles() {
        let graph: HashMap<&str, Vec<&str>> =
            HashMap::from([("A", vec![]), ("B", vec!["C"]), ("C", vec!["D", "B"]), ("D", vec![])]);
        let parents = |id: &str| -> Vec<String> {
            graph
                .get(id)
                .map(|parents| parents.iter().map(|p| p.to_string()).collect())
                .unwrap_or_default()
        };
        assert_eq!(find_cycle("A", parents), None);
        assert_eq!(
            find_cycle("B", parents),
            Some(vec!["B".to_string(), "C".to_string(), "B".to_string()])
        );
    }
}
