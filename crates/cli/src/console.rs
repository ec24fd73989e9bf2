//! Terminal rendering of a live run.

use marketlens_transcript::{Entry, EntryId, TranscriptTree, TranscriptView};
use std::io::Write;

/// View that keeps the full transcript tree and echoes each new entry to a
/// writer as it arrives. Retirement and collapse only affect the settled
/// rendering, since echoed lines cannot be taken back.
pub struct ConsoleView<W: Write> {
    tree: TranscriptTree,
    out: W,
    echo: bool,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W, echo: bool) -> Self {
        Self {
            tree: TranscriptTree::new(),
            out,
            echo,
        }
    }

    pub fn tree(&self) -> &TranscriptTree {
        &self.tree
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    fn depth(&self, id: EntryId) -> usize {
        let mut depth = 0;
        let mut current = self.tree.get(id).and_then(|node| node.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.tree.get(parent).and_then(|node| node.parent);
        }
        depth
    }

    fn echo(&mut self, id: EntryId) {
        if !self.echo {
            return;
        }
        let Some(node) = self.tree.get(id) else {
            return;
        };
        // Steps inside a collapsed container stay quiet until settled.
        let hidden = node
            .parent
            .and_then(|parent| self.tree.get(parent))
            .is_some_and(|parent| parent.entry.is_container() && parent.collapsed);
        if hidden {
            return;
        }
        let indent = "  ".repeat(self.depth(id));
        let rendered = match &node.entry {
            Entry::PlanSteps { heading, .. } => format!("+ {heading}"),
            entry => entry.to_string(),
        };
        for line in rendered.lines() {
            // a closed pipe must not abort the run
            let _ = writeln!(self.out, "{indent}{line}");
        }
        let _ = self.out.flush();
    }
}

impl<W: Write> TranscriptView for ConsoleView<W> {
    fn append_entry(&mut self, entry: Entry) -> EntryId {
        let id = self.tree.append_entry(entry);
        self.echo(id);
        id
    }

    fn append_child(&mut self, parent: EntryId, entry: Entry) -> EntryId {
        let id = self.tree.append_child(parent, entry);
        self.echo(id);
        id
    }

    fn retire_entry(&mut self, id: EntryId) {
        self.tree.retire_entry(id);
    }

    fn toggle_container(&mut self, id: EntryId) {
        self.tree.toggle_container(id);
    }

    fn clear(&mut self) {
        self.tree.clear();
    }
}
