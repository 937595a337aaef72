//! Dependency ordering for schema differences
//!
//! This module provides functionality to:
//! - Build a dependency graph between differences (dependency -> dependent)
//! - Topologically sort it with a deterministic tie-break
//! - Assign priorities so objects are created after what they reference and dropped
//!   before it

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::schema::diff::{DiffAction, ObjectType, SchemaDifference};

/// One node of the dependency graph
#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// Schema-qualified object name
    pub key: String,
    pub object_type: ObjectType,
    /// Schema-qualified names this node references
    pub dependencies: Vec<String>,
    /// A dropped node has to go before the objects it references
    pub dropped: bool,
}

/// Result of a topological sort
#[derive(Debug, Clone, Default)]
pub struct TopologicalOrder {
    /// Node indices, dependencies first
    pub order: Vec<usize>,
    /// Nodes that sat on a cycle; they are appended to `order` in tie-break order
    pub cyclic: Vec<usize>,
}

/// Only tables and functions are referenced by other objects
fn is_dependency_target(object_type: ObjectType) -> bool {
    matches!(object_type, ObjectType::Table | ObjectType::Function)
}

/// Topologically sort nodes by their dependencies.
///
/// A node normally comes after the nodes it references. A dropped node comes before
/// them instead, so dependents are dropped ahead of their dependencies. Among nodes that are ready at the same time, the one with the lower category rank
/// goes first, then the lower key. Dependencies naming objects that are not part of
/// the graph are ignored since those objects already exist.
pub fn topological_order(nodes: &[DependencyNode]) -> TopologicalOrder {
    let mut targets: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if is_dependency_target(node.object_type) {
            targets.entry(node.key.as_str()).or_default().push(idx);
        }
    }

    // For each node, the nodes that must come after it
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];
    let mut seen_edges: HashSet<(usize, usize)> = HashSet::new();

    for (idx, node) in nodes.iter().enumerate() {
        for dependency in &node.dependencies {
            let Some(matches) = targets.get(dependency.as_str()) else {
                continue;
            };
            if matches.len() > 1 {
                tracing::warn!(
                    dependency = dependency.as_str(),
                    dependent = node.key.as_str(),
                    matches = matches.len(),
                    "Dependency name matches more than one object"
                );
            }
            for &target in matches {
                if target == idx {
                    continue;
                }
                let (first, then) = if node.dropped { (idx, target) } else { (target, idx) };
                if seen_edges.insert((first, then)) {
                    dependents[first].push(then);
                    in_degree[then] += 1;
                }
            }
        }
    }

    let sort_key = |idx: usize| (nodes[idx].object_type.rank(), nodes[idx].key.clone(), idx);

    let mut ready: BTreeSet<(u8, String, usize)> = (0..nodes.len())
        .filter(|&idx| in_degree[idx] == 0)
        .map(sort_key)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        let current = next.2;
        order.push(current);

        for &dependent in &dependents[current] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(sort_key(dependent));
            }
        }
    }

    let mut cyclic = Vec::new();
    if order.len() != nodes.len() {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let mut remaining: Vec<usize> = (0..nodes.len()).filter(|i| !placed.contains(i)).collect();
        remaining.sort_by_key(|&idx| sort_key(idx));

        tracing::warn!(
            objects = ?remaining.iter().map(|&i| nodes[i].key.as_str()).collect::<Vec<_>>(),
            "Circular dependency detected; ordering the remaining objects by category and name"
        );

        order.extend(remaining.iter().copied());
        cyclic = remaining;
    }

    TopologicalOrder { order, cyclic }
}

/// Sort differences into dependency order and assign their priorities
pub fn assign_priorities(differences: Vec<SchemaDifference>) -> Vec<SchemaDifference> {
    let nodes: Vec<DependencyNode> = differences
        .iter()
        .map(|d| DependencyNode {
            key: d.qualified_name(),
            object_type: d.object_type(),
            dependencies: d.dependencies.clone(),
            dropped: d.action == DiffAction::Drop,
        })
        .collect();

    let sorted = topological_order(&nodes);

    let mut slots: Vec<Option<SchemaDifference>> = differences.into_iter().map(Some).collect();
    sorted
        .order
        .iter()
        .enumerate()
        .filter_map(|(position, &idx)| {
            slots[idx].take().map(|mut difference| {
                difference.priority = position as u32;
                difference
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &str, object_type: ObjectType, dependencies: &[&str]) -> DependencyNode {
        DependencyNode {
            key: key.to_string(),
            object_type,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            dropped: false,
        }
    }

    fn dropped(key: &str, object_type: ObjectType, dependencies: &[&str]) -> DependencyNode {
        DependencyNode {
            dropped: true,
            ..node(key, object_type, dependencies)
        }
    }

    fn keys(nodes: &[DependencyNode], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| nodes[i].key.clone()).collect()
    }

    #[test]
    fn simple_chain() {
        let nodes = vec![
            node("public.bank_transactions", ObjectType::Table, &["public.bank_accounts"]),
            node("public.bank_accounts", ObjectType::Table, &["public.banks"]),
            node("public.banks", ObjectType::Table, &[]),
        ];

        let sorted = topological_order(&nodes);
        assert_eq!(
            keys(&nodes, &sorted.order),
            vec!["public.banks", "public.bank_accounts", "public.bank_transactions"]
        );
        assert!(sorted.cyclic.is_empty());
    }

    #[test]
    fn ties_break_by_category_then_name() {
        let nodes = vec![
            node("public.users.audit", ObjectType::Trigger, &["public.users", "public.audit_fn"]),
            node("public.users_email_idx", ObjectType::Index, &["public.users"]),
            node("public.audit_fn", ObjectType::Function, &[]),
            node("public.users", ObjectType::Table, &[]),
            node("public.accounts", ObjectType::Table, &[]),
        ];

        let sorted = topological_order(&nodes);
        assert_eq!(
            keys(&nodes, &sorted.order),
            vec![
                "public.accounts",
                "public.users",
                "public.audit_fn",
                "public.users_email_idx",
                "public.users.audit",
            ]
        );
    }

    #[test]
    fn unknown_dependencies_are_ignored() {
        let nodes = vec![node("public.users.p", ObjectType::Policy, &["public.users"])];
        let sorted = topological_order(&nodes);
        assert_eq!(sorted.order, vec![0]);
    }

    #[test]
    fn cycles_are_appended_not_dropped() {
        let nodes = vec![
            node("public.a", ObjectType::Table, &["public.b"]),
            node("public.b", ObjectType::Table, &["public.a"]),
            node("public.c", ObjectType::Table, &[]),
        ];

        let sorted = topological_order(&nodes);
        assert_eq!(keys(&nodes, &sorted.order), vec!["public.c", "public.a", "public.b"]);
        assert_eq!(sorted.cyclic.len(), 2);
    }

    #[test]
    fn indexes_are_not_dependency_targets() {
        // An index sharing a table's qualified name must not satisfy the table dependency
        let nodes = vec![
            node("public.users.t", ObjectType::Trigger, &["public.users"]),
            node("public.users", ObjectType::Index, &[]),
        ];
        let sorted = topological_order(&nodes);
        assert_eq!(keys(&nodes, &sorted.order), vec!["public.users", "public.users.t"]);
    }

    #[test]
    fn drops_go_before_what_they_reference() {
        let nodes = vec![
            dropped("public.users", ObjectType::Table, &[]),
            dropped("public.orders", ObjectType::Table, &["public.users"]),
            dropped("public.orders_user_idx", ObjectType::Index, &["public.orders"]),
        ];

        let sorted = topological_order(&nodes);
        assert_eq!(
            keys(&nodes, &sorted.order),
            vec!["public.orders_user_idx", "public.orders", "public.users"]
        );
        assert!(sorted.cyclic.is_empty());
    }

    #[test]
    fn dropped_index_goes_before_its_altered_table() {
        let nodes = vec![
            node("public.orders", ObjectType::Table, &[]),
            dropped("public.orders_note_idx", ObjectType::Index, &["public.orders"]),
        ];

        let sorted = topological_order(&nodes);
        assert_eq!(
            keys(&nodes, &sorted.order),
            vec!["public.orders_note_idx", "public.orders"]
        );
    }
}
