//! In-memory transcript view.

use crate::view::{Entry, EntryId, TranscriptView};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: EntryId,
    pub entry: Entry,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
    pub retired: bool,
    pub collapsed: bool,
}

/// Ordered entry tree. Retired entries stay in the arena but are skipped by
/// every visible-entry query.
#[derive(Debug, Clone, Default)]
pub struct TranscriptTree {
    nodes: BTreeMap<EntryId, Node>,
    roots: Vec<EntryId>,
    next_id: u64,
}

impl TranscriptTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: EntryId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn is_visible(&self, id: EntryId) -> bool {
        self.nodes.get(&id).is_some_and(|node| !node.retired)
    }

    /// Visible top-level entries in order.
    pub fn roots(&self) -> Vec<&Node> {
        self.visible(&self.roots)
    }

    /// Visible children of `id` in order.
    pub fn children(&self, id: EntryId) -> Vec<&Node> {
        match self.nodes.get(&id) {
            Some(node) => self.visible(&node.children),
            None => Vec::new(),
        }
    }

    fn visible(&self, ids: &[EntryId]) -> Vec<&Node> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| !node.retired)
            .collect()
    }

    /// Depth-first walk over visible entries, ignoring collapse state.
    pub fn walk(&self) -> Vec<(usize, &Node)> {
        let mut out = Vec::new();
        for root in self.roots() {
            self.walk_into(root, 0, &mut out);
        }
        out
    }

    fn walk_into<'a>(&'a self, node: &'a Node, depth: usize, out: &mut Vec<(usize, &'a Node)>) {
        out.push((depth, node));
        for child in self.children(node.id) {
            self.walk_into(child, depth + 1, out);
        }
    }

    /// Visible entries matching `pred`, in walk order.
    pub fn find(&self, pred: impl Fn(&Entry) -> bool) -> Vec<&Node> {
        self.walk()
            .into_iter()
            .map(|(_, node)| node)
            .filter(|node| pred(&node.entry))
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.find(|entry| entry.kind() == kind).len()
    }

    pub fn len(&self) -> usize {
        self.walk().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Plain-text rendering. Collapsed containers show their heading and step
    /// count only, unless `expand_all` is set.
    pub fn render_plain(&self, expand_all: bool) -> String {
        let mut lines = Vec::new();
        for root in self.roots() {
            self.render_node(root, 0, expand_all, &mut lines);
        }
        lines.join("\n")
    }

    fn render_node(&self, node: &Node, depth: usize, expand_all: bool, lines: &mut Vec<String>) {
        let indent = "  ".repeat(depth);
        let children = self.children(node.id);
        if node.entry.is_container() && node.collapsed && !expand_all {
            let heading = match &node.entry {
                Entry::PlanSteps { heading, .. } => heading.as_str(),
                _ => "",
            };
            lines.push(format!("{indent}+ {heading} ({} hidden)", children.len()));
            return;
        }

        let rendered = node.entry.to_string();
        for line in rendered.lines() {
            lines.push(format!("{indent}{line}"));
        }
        for (idx, child) in children.iter().enumerate() {
            if node.entry.is_container() {
                let mut numbered = Vec::new();
                self.render_node(child, depth + 1, expand_all, &mut numbered);
                if let Some(first) = numbered.first_mut() {
                    let trimmed = first.trim_start().to_string();
                    *first = format!("{}{}. {trimmed}", "  ".repeat(depth + 1), idx + 1);
                }
                lines.extend(numbered);
            } else {
                self.render_node(child, depth + 1, expand_all, lines);
            }
        }
    }

    fn insert(&mut self, parent: Option<EntryId>, entry: Entry) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        let collapsed = entry.is_container();
        self.nodes.insert(
            id,
            Node {
                id,
                entry,
                parent,
                children: Vec::new(),
                retired: false,
                collapsed,
            },
        );
        id
    }
}

impl TranscriptView for TranscriptTree {
    fn append_entry(&mut self, entry: Entry) -> EntryId {
        let id = self.insert(None, entry);
        self.roots.push(id);
        id
    }

    fn append_child(&mut self, parent: EntryId, entry: Entry) -> EntryId {
        if !self.nodes.contains_key(&parent) {
            return self.append_entry(entry);
        }
        let id = self.insert(Some(parent), entry);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        id
    }

    fn retire_entry(&mut self, id: EntryId) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.retired = true;
        }
    }

    fn toggle_container(&mut self, id: EntryId) {
        if let Some(node) = self.nodes.get_mut(&id)
            && node.entry.is_container()
        {
            node.collapsed = !node.collapsed;
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketlens_core::{AgentName, PlanStep};

    fn step(task: &str) -> Entry {
        Entry::PlanStep {
            step: PlanStep {
                task: Some(task.to_string()),
                description: Some("d".to_string()),
                note: None,
                agent: Some("coder".to_string()),
            },
            standalone: false,
        }
    }

    #[test]
    fn retired_entries_disappear_from_queries() {
        let mut tree = TranscriptTree::new();
        let busy = tree.append_entry(Entry::Processing {
            agent: AgentName::Coder,
            text: "Coder is coding".to_string(),
        });
        assert_eq!(tree.count("processing"), 1);
        tree.retire_entry(busy);
        tree.retire_entry(busy);
        assert_eq!(tree.count("processing"), 0);
        assert!(!tree.is_visible(busy));
        assert!(tree.get(busy).is_some());
    }

    #[test]
    fn containers_start_collapsed_and_toggle() {
        let mut tree = TranscriptTree::new();
        let output = tree.append_entry(Entry::AgentOutput {
            agent: Some(AgentName::Planner),
            text: "Thought: check margins".to_string(),
        });
        let container = tree.append_child(output, Entry::plan_steps_container());
        tree.append_child(container, step("A"));
        tree.append_child(container, step("B"));

        assert!(tree.get(container).expect("container").collapsed);
        let collapsed = tree.render_plain(false);
        assert!(collapsed.contains("+ Plan Steps (2 hidden)"));
        assert!(!collapsed.contains("A (Coder)"));

        tree.toggle_container(container);
        let expanded = tree.render_plain(false);
        assert!(expanded.contains("    1. A (Coder): d"));
        assert!(expanded.contains("    2. B (Coder): d"));

        // non-containers ignore toggles
        tree.toggle_container(output);
        assert!(!tree.get(output).expect("output").collapsed);
    }

    #[test]
    fn unknown_parent_appends_at_top_level() {
        let mut tree = TranscriptTree::new();
        let id = tree.append_child(EntryId(99), Entry::Separator);
        assert_eq!(tree.roots().len(), 1);
        assert_eq!(tree.get(id).expect("node").parent, None);
    }

    #[test]
    fn clear_keeps_ids_unique() {
        let mut tree = TranscriptTree::new();
        let first = tree.append_entry(Entry::Separator);
        tree.clear();
        assert!(tree.is_empty());
        let second = tree.append_entry(Entry::Separator);
        assert_ne!(first, second);
        assert!(tree.get(first).is_none());
    }
}
