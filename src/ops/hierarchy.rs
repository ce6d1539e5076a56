use std::collections::HashMap;

use crate::model::task::Task;

/// One task in the pass arena
#[derive(Debug, Clone)]
struct Node {
    /// Index into the cycle's task list
    task: usize,
    /// Arena index of the parent, if the parent is in this group
    parent: Option<usize>,
    /// Arena indices of children, in sibling order
    children: Vec<usize>,
    /// Parent reference is the root sentinel
    top_level: bool,
}

/// Parent/child structure of one project or section group.
///
/// Built fresh every pass from a flat task list. Tasks are addressed by
/// their index into that list; the hierarchy never owns them, so a pass can
/// mutate tasks while walking.
#[derive(Debug, Clone, Default)]
pub struct Hierarchy {
    nodes: Vec<Node>,
    /// Arena indices, parents before children
    walk: Vec<usize>,
}

impl Hierarchy {
    /// Build the hierarchy over `members` (indices into `tasks`).
    ///
    /// Tasks whose content starts with `inert_prefix` are dropped entirely;
    /// their children then hang off a parent outside the group and are
    /// walked as detached subtrees after the rooted ones.
    pub fn build(tasks: &[Task], members: &[usize], inert_prefix: &str) -> Self {
        let mut nodes: Vec<Node> = members
            .iter()
            .copied()
            .filter(|&i| inert_prefix.is_empty() || !tasks[i].content.starts_with(inert_prefix))
            .map(|i| Node {
                task: i,
                parent: None,
                children: Vec::new(),
                top_level: tasks[i].is_top_level(),
            })
            .collect();

        let by_id: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(n, node)| (tasks[node.task].id.as_str(), n))
            .collect();

        for n in 0..nodes.len() {
            let task = &tasks[nodes[n].task];
            if let Some(pid) = task.parent()
                && let Some(&p) = by_id.get(pid)
                && p != n
            {
                nodes[n].parent = Some(p);
                nodes[p].children.push(n);
            }
        }

        let keys: Vec<(i64, &str)> = nodes
            .iter()
            .map(|node| {
                let t = &tasks[node.task];
                (t.order, t.id.as_str())
            })
            .collect();
        for node in nodes.iter_mut() {
            node.children.sort_by_key(|&c| keys[c]);
        }

        let mut starts: Vec<usize> = (0..nodes.len())
            .filter(|&n| nodes[n].parent.is_none())
            .collect();
        starts.sort_by_key(|&n| (!nodes[n].top_level, keys[n]));
        // Members of a parent cycle have no start of their own
        let mut rest: Vec<usize> = (0..nodes.len()).collect();
        rest.sort_by_key(|&n| keys[n]);
        starts.extend(rest);

        let mut walk = Vec::with_capacity(nodes.len());
        let mut visited = vec![false; nodes.len()];
        for start in starts {
            let mut stack = vec![start];
            while let Some(n) = stack.pop() {
                if visited[n] {
                    continue;
                }
                visited[n] = true;
                walk.push(n);
                stack.extend(nodes[n].children.iter().rev().copied());
            }
        }

        Hierarchy { nodes, walk }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in walk order: every parent before its children, siblings by
    /// `(order, id)`.
    pub fn walk(&self) -> &[usize] {
        &self.walk
    }

    /// Index of the node's task in the cycle's task list
    pub fn task(&self, node: usize) -> usize {
        self.nodes[node].task
    }

    pub fn parent(&self, node: usize) -> Option<usize> {
        self.nodes[node].parent
    }

    pub fn is_top_level(&self, node: usize) -> bool {
        self.nodes[node].top_level
    }

    /// All children, checked or not
    pub fn children(&self, node: usize) -> &[usize] {
        &self.nodes[node].children
    }

    /// Children that are not checked, read from the current task state
    pub fn open_children(&self, tasks: &[Task], node: usize) -> Vec<usize> {
        self.nodes[node]
            .children
            .iter()
            .copied()
            .filter(|&c| !tasks[self.nodes[c].task].checked)
            .collect()
    }
}
