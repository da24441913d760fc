//! Component-type hierarchy built from `"A > B > C"` tree paths.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Parent links come from
//! each definition's own path (the second-to-last segment), children are
//! derived from those links, and every node's transitive descendant set is
//! computed once, after all links exist, by an iterative depth-first walk.
//! The finished [`CategoryTree`] is immutable.

use std::collections::HashMap;

use leadtime_core::error::{HierarchyCycleError, OrphanCategory};
use leadtime_core::models::{split_tree_path, CategoryDefinition};
use tracing::{debug, warn};

// ── CategoryNode ──────────────────────────────────────────────────────────────

/// Index of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One component type in the hierarchy.
#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub name: String,
    pub level: u32,
    /// Path segments, most general first, as given in the definition.
    pub tree_path: Vec<String>,
    /// Parent named by the tree path, whether or not it exists.
    pub declared_parent: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Transitive descendants, excluding the node itself, in depth-first
    /// order.
    descendants: Vec<NodeId>,
}

impl CategoryNode {
    /// The tree path joined back into `"A > B > C"` form.
    pub fn tree_path_string(&self) -> String {
        self.tree_path.join(" > ")
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

// ── CategoryTree ──────────────────────────────────────────────────────────────

/// Immutable forest of component types with precomputed descendant sets.
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    index: HashMap<String, NodeId>,
    orphans: Vec<OrphanCategory>,
}

/// Per-node DFS state.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    OnPath,
    Done,
}

impl CategoryTree {
    /// Build the tree from flat definitions.
    ///
    /// * Duplicate names: the last definition wins, keeping the position of
    ///   the first.
    /// * A node whose declared parent is not defined becomes a root and is
    ///   reported through [`orphans`](Self::orphans).
    /// * A loop in the parent links fails the whole build; no partially
    ///   closed tree is ever returned.
    pub fn build(definitions: &[CategoryDefinition]) -> Result<Self, HierarchyCycleError> {
        let mut tree = CategoryTree::default();

        // 1. Register nodes.
        for def in definitions {
            let name = def.name.trim();
            if name.is_empty() {
                continue;
            }
            let mut tree_path = split_tree_path(&def.tree_path);
            if tree_path.is_empty() {
                tree_path.push(name.to_string());
            }
            let declared_parent = tree_path
                .len()
                .checked_sub(2)
                .map(|i| tree_path[i].clone());

            let node = CategoryNode {
                name: name.to_string(),
                level: def.level,
                tree_path,
                declared_parent,
                parent: None,
                children: Vec::new(),
                descendants: Vec::new(),
            };

            match tree.index.get(name) {
                Some(&NodeId(i)) => {
                    debug!("duplicate category definition \"{}\"; keeping the last", name);
                    tree.nodes[i] = node;
                }
                None => {
                    tree.index
                        .insert(name.to_string(), NodeId(tree.nodes.len()));
                    tree.nodes.push(node);
                }
            }
        }

        // 2. Resolve parent and child links.
        for i in 0..tree.nodes.len() {
            let Some(declared) = tree.nodes[i].declared_parent.clone() else {
                continue;
            };
            match tree.index.get(&declared).copied() {
                Some(parent) => {
                    tree.nodes[i].parent = Some(parent);
                    let siblings = &mut tree.nodes[parent.0].children;
                    if !siblings.contains(&NodeId(i)) {
                        siblings.push(NodeId(i));
                    }
                }
                None => {
                    let orphan = OrphanCategory {
                        name: tree.nodes[i].name.clone(),
                        declared_parent: declared,
                    };
                    warn!("{}", orphan);
                    tree.orphans.push(orphan);
                }
            }
        }

        // 3. Descendant closure; only runs once every link is final.
        tree.compute_descendants()?;

        debug!(
            "built category tree: {} nodes, {} roots, {} orphans",
            tree.nodes.len(),
            tree.roots().count(),
            tree.orphans.len()
        );
        Ok(tree)
    }

    /// Iterative post-order DFS over child links.
    ///
    /// A node's descendants are its children plus each child's (already
    /// finished) descendants, so every node is closed exactly once. Meeting a
    /// node that is still on the current path means the links loop.
    fn compute_descendants(&mut self) -> Result<(), HierarchyCycleError> {
        let n = self.nodes.len();
        let mut state = vec![Visit::New; n];
        let mut closures: Vec<Vec<NodeId>> = vec![Vec::new(); n];

        for start in 0..n {
            if state[start] != Visit::New {
                continue;
            }
            // (node, index of next child to visit)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            state[start] = Visit::OnPath;

            while let Some(&mut (node, ref mut next_child)) = stack.last_mut() {
                if let Some(&NodeId(child)) = self.nodes[node].children.get(*next_child) {
                    *next_child += 1;
                    match state[child] {
                        Visit::New => {
                            state[child] = Visit::OnPath;
                            stack.push((child, 0));
                        }
                        Visit::OnPath => return Err(self.cycle_error(&stack, child)),
                        Visit::Done => {}
                    }
                    continue;
                }

                // Each node has one parent, so the children's closures are
                // disjoint and can be appended without de-duplication.
                let mut closure: Vec<NodeId> = Vec::new();
                for &child in &self.nodes[node].children {
                    closure.push(child);
                    closure.extend_from_slice(&closures[child.0]);
                }
                closures[node] = closure;
                state[node] = Visit::Done;
                stack.pop();
            }
        }

        for (node, closure) in self.nodes.iter_mut().zip(closures) {
            node.descendants = closure;
        }
        Ok(())
    }

    fn cycle_error(&self, stack: &[(usize, usize)], reentered: usize) -> HierarchyCycleError {
        let from = stack
            .iter()
            .position(|&(node, _)| node == reentered)
            .unwrap_or(0);
        let mut cycle: Vec<String> = stack[from..]
            .iter()
            .map(|&(node, _)| self.nodes[node].name.clone())
            .collect();
        cycle.push(self.nodes[reentered].name.clone());
        HierarchyCycleError { cycle }
    }

    // ── Lookups ───────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&CategoryNode> {
        self.index.get(name).map(|id| &self.nodes[id.0])
    }

    /// All nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &CategoryNode> {
        self.nodes.iter()
    }

    /// Nodes without a resolved parent, including orphans.
    pub fn roots(&self) -> impl Iterator<Item = &CategoryNode> {
        self.nodes.iter().filter(|n| n.is_root())
    }

    /// Categories whose declared parent was missing.
    pub fn orphans(&self) -> &[OrphanCategory] {
        &self.orphans
    }

    /// Resolved parent; `None` for roots, orphans and unknown names.
    pub fn parent(&self, name: &str) -> Option<&str> {
        let node = self.node(name)?;
        node.parent.map(|p| self.nodes[p.0].name.as_str())
    }

    /// Direct children; empty for leaves and unknown names.
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.names(self.node(name).map(|n| n.children.as_slice()))
    }

    /// Every transitive descendant, excluding `name` itself.
    pub fn descendants(&self, name: &str) -> Vec<&str> {
        self.names(self.node(name).map(|n| n.descendants.as_slice()))
    }

    /// Ancestors taken from the tree path, most general first, excluding
    /// `name` itself.
    pub fn ancestors(&self, name: &str) -> Vec<&str> {
        match self.node(name) {
            Some(node) => node.tree_path[..node.tree_path.len().saturating_sub(1)]
                .iter()
                .map(String::as_str)
                .collect(),
            None => Vec::new(),
        }
    }

    fn names(&self, ids: Option<&[NodeId]>) -> Vec<&str> {
        ids.unwrap_or_default()
            .iter()
            .map(|id| self.nodes[id.0].name.as_str())
            .collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, level: u32, path: &str) -> CategoryDefinition {
        CategoryDefinition::new(name, level, path)
    }

    fn hvac() -> Vec<CategoryDefinition> {
        vec![
            def("HVAC", 1, "HVAC"),
            def("Air Handling", 2, "HVAC > Air Handling"),
            def("Fan", 3, "HVAC > Air Handling > Fan"),
            def("Inline Fan", 4, "HVAC > Air Handling > Fan > Inline Fan"),
            def("Damper", 3, "HVAC > Air Handling > Damper"),
            def("Cooling", 2, "HVAC > Cooling"),
            def("Chiller", 3, "HVAC > Cooling > Chiller"),
            def("Electrical", 1, "Electrical"),
        ]
    }

    fn sorted(mut v: Vec<&str>) -> Vec<&str> {
        v.sort_unstable();
        v
    }

    // ── build ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_parent_and_children_links() {
        let tree = CategoryTree::build(&hvac()).unwrap();
        assert_eq!(tree.len(), 8);
        assert_eq!(tree.parent("Fan"), Some("Air Handling"));
        assert_eq!(tree.parent("HVAC"), None);
        assert_eq!(tree.children("Air Handling"), vec!["Fan", "Damper"]);
        assert!(tree.children("Chiller").is_empty());
    }

    #[test]
    fn test_descendants_are_transitive_and_exclude_self() {
        let tree = CategoryTree::build(&hvac()).unwrap();
        assert_eq!(
            sorted(tree.descendants("HVAC")),
            vec!["Air Handling", "Chiller", "Cooling", "Damper", "Fan", "Inline Fan"]
        );
        assert_eq!(
            sorted(tree.descendants("Air Handling")),
            vec!["Damper", "Fan", "Inline Fan"]
        );
        assert!(tree.descendants("Inline Fan").is_empty());
        assert!(tree.descendants("Electrical").is_empty());
    }

    #[test]
    fn test_descendants_equal_children_plus_their_descendants() {
        let tree = CategoryTree::build(&hvac()).unwrap();
        for node in tree.nodes() {
            let mut expected: Vec<&str> = Vec::new();
            for child in tree.children(&node.name) {
                expected.push(child);
                expected.extend(tree.descendants(child));
            }
            assert_eq!(sorted(tree.descendants(&node.name)), sorted(expected));
        }
    }

    #[test]
    fn test_ancestors_from_tree_path() {
        let tree = CategoryTree::build(&hvac()).unwrap();
        assert_eq!(
            tree.ancestors("Inline Fan"),
            vec!["HVAC", "Air Handling", "Fan"]
        );
        assert!(tree.ancestors("HVAC").is_empty());
        assert!(tree.ancestors("Unknown").is_empty());
    }

    #[test]
    fn test_roots() {
        let tree = CategoryTree::build(&hvac()).unwrap();
        let roots: Vec<&str> = tree.roots().map(|n| n.name.as_str()).collect();
        assert_eq!(roots, vec!["HVAC", "Electrical"]);
    }

    #[test]
    fn test_orphan_becomes_root_with_warning() {
        let defs = vec![
            def("Fan", 2, "Air Handling > Fan"),
            def("Inline Fan", 3, "Air Handling > Fan > Inline Fan"),
        ];
        let tree = CategoryTree::build(&defs).unwrap();
        assert_eq!(tree.parent("Fan"), None);
        assert!(tree.node("Fan").unwrap().is_root());
        assert_eq!(tree.orphans().len(), 1);
        assert_eq!(tree.orphans()[0].declared_parent, "Air Handling");
        // The orphan still owns its subtree.
        assert_eq!(tree.descendants("Fan"), vec!["Inline Fan"]);
    }

    #[test]
    fn test_two_node_cycle_is_rejected() {
        let defs = vec![def("A", 1, "B > A"), def("B", 1, "A > B")];
        let err = CategoryTree::build(&defs).unwrap_err();
        assert_eq!(err.cycle.len(), 3);
        assert_eq!(err.cycle.first(), err.cycle.last());
        assert!(err.cycle.contains(&"A".to_string()));
        assert!(err.cycle.contains(&"B".to_string()));
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let defs = vec![def("Loop", 1, "Loop > Loop")];
        let err = CategoryTree::build(&defs).unwrap_err();
        assert_eq!(err.cycle, vec!["Loop".to_string(), "Loop".to_string()]);
    }

    #[test]
    fn test_cycle_below_valid_root_is_rejected() {
        let defs = vec![
            def("Root", 1, "Root"),
            def("X", 2, "Root > Z > X"),
            def("Y", 2, "X > Y"),
            def("Z", 2, "Y > Z"),
        ];
        let err = CategoryTree::build(&defs).unwrap_err();
        assert!(err.to_string().contains("cycle"));
        assert_eq!(err.cycle.len(), 4);
    }

    #[test]
    fn test_duplicate_definition_last_wins() {
        let defs = vec![
            def("HVAC", 1, "HVAC"),
            def("Fan", 2, "Old > Fan"),
            def("Fan", 2, "HVAC > Fan"),
        ];
        let tree = CategoryTree::build(&defs).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.parent("Fan"), Some("HVAC"));
        assert!(tree.orphans().is_empty());
    }

    #[test]
    fn test_empty_path_makes_root_and_blank_names_skipped() {
        let defs = vec![def("Boiler", 1, ""), def("  ", 1, "X > Y")];
        let tree = CategoryTree::build(&defs).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node("Boiler").unwrap().tree_path, vec!["Boiler"]);
        assert_eq!(tree.parent("Boiler"), None);
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut defs = Vec::new();
        let mut path = String::new();
        for i in 0..2_000 {
            let name = format!("n{i}");
            if path.is_empty() {
                path = name.clone();
            } else {
                path = format!("n{} > {}", i - 1, name);
            }
            defs.push(def(&name, i + 1, &path));
        }
        let tree = CategoryTree::build(&defs).unwrap();
        assert_eq!(tree.descendants("n0").len(), 1_999);
        assert_eq!(tree.parent("n1999"), Some("n1998"));
    }

    #[test]
    fn test_name_with_angle_bracket_keeps_its_parent() {
        let tree = CategoryTree::build(&[
            def("Motors", 1, "Motors"),
            def("Motor >50HP", 2, "Motors > Motor >50HP"),
        ])
        .unwrap();

        assert_eq!(tree.parent("Motor >50HP"), Some("Motors"));
        assert_eq!(tree.ancestors("Motor >50HP"), vec!["Motors"]);
        assert_eq!(tree.descendants("Motors"), vec!["Motor >50HP"]);
        assert!(tree.orphans().is_empty());
    }

    #[test]
    fn test_empty_definitions() {
        let tree = CategoryTree::build(&[]).unwrap();
        assert!(tree.is_empty());
        assert!(tree.descendants("anything").is_empty());
    }
}
