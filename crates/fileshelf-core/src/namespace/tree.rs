use super::overlay::{self, DeletePlan, FileDrop, FilePlan, MovePlan, Occurrence};
use crate::error::{Error, Result};
use crate::paths;
use crate::storage::models::{DirId, DirKind, FileId, FileRecord, TreeRow, ROOT_DIR_ID};
use crate::storage::Database;
use ahash::{AHashMap, AHashSet};
use std::fmt::Write as _;
use tracing::{debug, info, warn};

/// Index of a node in the tree arena. Ids of removed nodes are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One occurrence of a directory in the displayed tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub dir_id: DirId,
    /// Directory this occurrence hangs under.
    pub parent_dir: DirId,
    pub kind: DirKind,
    pub label: String,
    pub occurrence: Occurrence,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl TreeNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    fn sort_key(&self) -> (String, DirId, Occurrence) {
        (self.label.to_lowercase(), self.dir_id, self.occurrence)
    }
}

/// A file picked up by a drag, with the virtual folder it was listed under
/// when it came from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileRef {
    pub file_id: FileId,
    pub source_virtual: Option<DirId>,
}

impl FileRef {
    pub fn owned(file_id: FileId) -> Self {
        Self {
            file_id,
            source_virtual: None,
        }
    }

    pub fn listed_in(file_id: FileId, virtual_dir: DirId) -> Self {
        Self {
            file_id,
            source_virtual: Some(virtual_dir),
        }
    }
}

#[derive(Debug, Clone)]
struct DirInfo {
    path: String,
    kind: DirKind,
    parent_id: DirId,
}

impl DirInfo {
    fn label(&self) -> String {
        match self.kind {
            DirKind::Real => paths::label_of(&self.path),
            DirKind::Favorites | DirKind::Virtual | DirKind::Group => self.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    dir_id: DirId,
    parent_dir: DirId,
    kind: DirKind,
    occurrence: Occurrence,
}

/// The directory graph as a tree: every primary and alias edge reachable
/// from the root is materialized as its own node, so a directory aliased
/// into three folders owns three subtrees.
///
/// Edits validate against the graph, write the store, then patch the
/// projection edge by edge. After any successful edit the tree equals what
/// [`NamespaceTree::load`] would build from the store.
pub struct NamespaceTree {
    nodes: Vec<Option<TreeNode>>,
    root: NodeId,
    occurrences: AHashMap<DirId, Vec<NodeId>>,
    dirs: AHashMap<DirId, DirInfo>,
    edges: AHashMap<DirId, Vec<(DirId, Occurrence)>>,
}

impl NamespaceTree {
    pub fn load(db: &Database) -> Result<Self> {
        let rows = db.tree_rows()?;
        Ok(Self::from_rows(&rows))
    }

    /// Builds the projection in two passes: index every edge by parent,
    /// then materialize depth-first from the root. Edges closing a cycle
    /// are skipped.
    pub fn from_rows(rows: &[TreeRow]) -> Self {
        let mut tree = Self::empty();

        for row in rows.iter().filter(|row| !row.via_alias) {
            tree.dirs.insert(
                row.dir_id,
                DirInfo {
                    path: row.path.clone(),
                    kind: row.kind,
                    parent_id: row.parent_id,
                },
            );
        }

        let mut orphans = 0;
        for row in rows {
            if row.parent_id != ROOT_DIR_ID && !tree.dirs.contains_key(&row.parent_id) {
                orphans += 1;
                continue;
            }
            let occurrence = if row.via_alias {
                Occurrence::Alias
            } else {
                Occurrence::Primary
            };
            tree.edges
                .entry(row.parent_id)
                .or_default()
                .push((row.dir_id, occurrence));
        }
        if orphans > 0 {
            warn!("Ignoring {} edges with an unknown parent", orphans);
        }

        let top_level = tree.edges.get(&ROOT_DIR_ID).cloned().unwrap_or_default();
        for (dir_id, occurrence) in top_level {
            tree.materialize(tree.root, dir_id, occurrence);
        }

        let unreachable = tree
            .dirs
            .keys()
            .filter(|dir| !tree.occurrences.contains_key(*dir))
            .count();
        if unreachable > 0 {
            warn!("{} directories are not reachable from the root", unreachable);
        }
        debug!(
            "Built namespace tree: {} directories, {} nodes",
            tree.dirs.len(),
            tree.node_count()
        );
        tree
    }

    fn empty() -> Self {
        let root = TreeNode {
            dir_id: ROOT_DIR_ID,
            parent_dir: ROOT_DIR_ID,
            kind: DirKind::Real,
            label: String::new(),
            occurrence: Occurrence::Primary,
            parent: None,
            children: Vec::new(),
        };
        let mut occurrences = AHashMap::new();
        occurrences.insert(ROOT_DIR_ID, vec![NodeId(0)]);
        Self {
            nodes: vec![Some(root)],
            root: NodeId(0),
            occurrences,
            dirs: AHashMap::new(),
            edges: AHashMap::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(TreeNode::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(TreeNode::parent)
    }

    /// Every node showing `dir_id`, primary and aliases alike.
    pub fn occurrences(&self, dir_id: DirId) -> &[NodeId] {
        self.occurrences
            .get(&dir_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First node showing `dir_id` directly under `parent_dir`.
    pub fn find_occurrence(&self, parent_dir: DirId, dir_id: DirId) -> Option<NodeId> {
        self.occurrences(dir_id)
            .iter()
            .copied()
            .find(|&id| self.node(id).is_some_and(|n| n.parent_dir == parent_dir))
    }

    pub fn primary_occurrence(&self, dir_id: DirId) -> Option<NodeId> {
        self.occurrences(dir_id).iter().copied().find(|&id| {
            self.node(id)
                .is_some_and(|n| n.occurrence == Occurrence::Primary)
        })
    }

    /// Parent recorded in the directory's own row.
    pub fn primary_parent(&self, dir_id: DirId) -> Option<DirId> {
        self.dirs.get(&dir_id).map(|info| info.parent_id)
    }

    /// Live nodes, the root excluded.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count() - 1
    }

    /// Files shown under a node: aliases for virtual folders, owned files
    /// otherwise.
    pub fn files(&self, db: &Database, id: NodeId) -> Result<Vec<FileRecord>> {
        let slot = self.slot(id)?;
        if slot.dir_id == ROOT_DIR_ID {
            return Ok(Vec::new());
        }
        let files = if slot.kind.is_virtual() {
            db.files_in_virtual_dir(slot.dir_id)?
        } else {
            db.files_in_dir(slot.dir_id)?
        };
        Ok(files)
    }

    /// Indented text dump, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(NodeId, usize)> = self
            .children(self.root)
            .iter()
            .rev()
            .map(|&child| (child, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            let kind = match node.kind {
                DirKind::Real => "",
                DirKind::Favorites => " [favorites]",
                DirKind::Virtual => " [virtual]",
                DirKind::Group => " [group]",
            };
            let alias = match node.occurrence {
                Occurrence::Primary => "",
                Occurrence::Alias => " (alias)",
            };
            let _ = writeln!(
                out,
                "{}{} #{}{}{}",
                "  ".repeat(depth),
                node.label,
                node.dir_id,
                kind,
                alias
            );
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
        out
    }

    // ── Directory edits ──────────────────────────────────────────

    pub fn create_virtual_folder(
        &mut self,
        db: &Database,
        parent: NodeId,
        label: &str,
    ) -> Result<DirId> {
        let parent_dir = self.slot(parent)?.dir_id;
        let label = clean_label(label)?;

        let dir_id = db.insert_dir(&label, parent_dir, DirKind::Virtual)?;
        self.dirs.insert(
            dir_id,
            DirInfo {
                path: label,
                kind: DirKind::Virtual,
                parent_id: parent_dir,
            },
        );
        self.attach_edge(parent_dir, dir_id, Occurrence::Primary);

        info!("Created virtual folder {} under {}", dir_id, parent_dir);
        Ok(dir_id)
    }

    pub fn rename(&mut self, db: &Database, id: NodeId, label: &str) -> Result<()> {
        let slot = self.editable(id)?;
        overlay::check_rename(slot.kind)?;
        let label = clean_label(label)?;

        db.rename_dir(slot.dir_id, &label)?;
        if let Some(info) = self.dirs.get_mut(&slot.dir_id) {
            info.path = label.clone();
        }
        for node in self.occurrences(slot.dir_id).to_vec() {
            if let Some(Some(n)) = self.nodes.get_mut(node.0) {
                n.label = label.clone();
            }
            if let Some(parent) = self.parent(node) {
                self.unlink_child(parent, node);
                self.insert_child(parent, node);
            }
        }
        info!("Renamed dir {} to {:?}", slot.dir_id, label);
        Ok(())
    }

    /// Moves the occurrence `id` under `new_parent`. A primary occurrence
    /// changes the directory's parent; an alias occurrence swaps its alias
    /// edge and leaves the directory and its other occurrences alone.
    pub fn move_node(&mut self, db: &Database, id: NodeId, new_parent: NodeId) -> Result<()> {
        let slot = self.editable(id)?;
        let target = self.slot(new_parent)?.dir_id;
        let plan = overlay::plan_move(slot.kind, slot.occurrence)?;
        if target == slot.parent_dir {
            return Ok(());
        }
        self.check_new_edge(target, slot.dir_id)?;

        match plan {
            MovePlan::Reparent => {
                db.set_dir_parent(slot.dir_id, target)?;
                self.set_primary_parent(slot.dir_id, target);
                self.detach_edge(slot.parent_dir, slot.dir_id, Occurrence::Primary);
                self.attach_edge(target, slot.dir_id, Occurrence::Primary);
            }
            MovePlan::ReAlias => {
                let tx = db.connection().unchecked_transaction()?;
                db.delete_alias(slot.parent_dir, slot.dir_id)?;
                db.insert_alias(target, slot.dir_id)?;
                tx.commit()?;
                self.detach_edge(slot.parent_dir, slot.dir_id, Occurrence::Alias);
                self.attach_edge(target, slot.dir_id, Occurrence::Alias);
            }
        }
        info!(
            "Moved dir {} from {} to {} ({:?})",
            slot.dir_id, slot.parent_dir, target, plan
        );
        Ok(())
    }

    /// Shows the directory of `id` under `new_parent` as well.
    pub fn copy_node(&mut self, db: &Database, id: NodeId, new_parent: NodeId) -> Result<()> {
        let slot = self.editable(id)?;
        let target = self.slot(new_parent)?.dir_id;
        self.check_new_edge(target, slot.dir_id)?;

        db.insert_alias(target, slot.dir_id)?;
        self.attach_edge(target, slot.dir_id, Occurrence::Alias);

        info!("Aliased dir {} under {}", slot.dir_id, target);
        Ok(())
    }

    /// Creates a group folder under `parent` and makes it the primary parent
    /// of every selected directory.
    pub fn group(
        &mut self,
        db: &Database,
        parent: NodeId,
        selected: &[NodeId],
        label: &str,
    ) -> Result<DirId> {
        let parent_dir = self.slot(parent)?.dir_id;
        let label = clean_label(label)?;

        let mut members: Vec<Slot> = Vec::new();
        for &id in selected {
            let slot = self.editable(id)?;
            overlay::check_groupable(slot.kind, slot.occurrence)?;
            if self.reaches(slot.dir_id, parent_dir) {
                return Err(Error::Conflict(format!(
                    "dir {} cannot be grouped inside itself",
                    slot.dir_id
                )));
            }
            if !members.iter().any(|m| m.dir_id == slot.dir_id) {
                members.push(slot);
            }
        }
        if members.is_empty() {
            return Err(Error::Conflict("nothing selected to group".to_string()));
        }

        let tx = db.connection().unchecked_transaction()?;
        let group_id = db.insert_dir(&label, parent_dir, DirKind::Group)?;
        for member in &members {
            db.set_dir_parent(member.dir_id, group_id)?;
        }
        tx.commit()?;

        self.dirs.insert(
            group_id,
            DirInfo {
                path: label,
                kind: DirKind::Group,
                parent_id: parent_dir,
            },
        );
        self.attach_edge(parent_dir, group_id, Occurrence::Primary);
        for member in &members {
            self.set_primary_parent(member.dir_id, group_id);
            self.detach_edge(member.parent_dir, member.dir_id, Occurrence::Primary);
            self.attach_edge(group_id, member.dir_id, Occurrence::Primary);
        }

        info!(
            "Grouped {} directories into {} under {}",
            members.len(),
            group_id,
            parent_dir
        );
        Ok(group_id)
    }

    pub fn delete(&mut self, db: &Database, id: NodeId) -> Result<()> {
        let slot = self.editable(id)?;
        let plan = overlay::plan_delete(slot.kind, slot.occurrence)?;

        match plan {
            DeletePlan::RemoveAlias => {
                if db.delete_alias(slot.parent_dir, slot.dir_id)? == 0 {
                    return Err(Error::NotFound(format!(
                        "alias of dir {} under {}",
                        slot.dir_id, slot.parent_dir
                    )));
                }
                self.detach_edge(slot.parent_dir, slot.dir_id, Occurrence::Alias);
            }
            DeletePlan::CascadeReal => {
                let doomed = db.subtree_dir_ids(slot.dir_id, None)?;
                db.delete_dir(slot.dir_id)?;
                for dir in doomed {
                    self.forget_dir(dir);
                }
            }
            DeletePlan::RemoveOriginal => self.remove_original(db, slot)?,
        }
        info!("Deleted dir {} under {} ({:?})", slot.dir_id, slot.parent_dir, plan);
        Ok(())
    }

    /// Real and group directories survive the removal of a virtual or group
    /// folder by moving up to its parent, including those nested below
    /// virtual children. The virtual rows in between go with it.
    fn remove_original(&mut self, db: &Database, slot: Slot) -> Result<()> {
        let grand = slot.parent_dir;
        let lifted: Vec<(DirId, DirId)> = db
            .nearest_non_virtual_descendants(slot.dir_id)?
            .into_iter()
            .map(|dir| (dir.id, dir.parent_id))
            .collect();
        let displaced: Vec<DirId> = lifted
            .iter()
            .map(|&(child, _)| child)
            .filter(|&child| self.has_edge_of(grand, child, Occurrence::Alias))
            .collect();

        let tx = db.connection().unchecked_transaction()?;
        for &child in &displaced {
            db.delete_alias(grand, child)?;
        }
        for &(child, _) in &lifted {
            db.set_dir_parent(child, grand)?;
        }
        let doomed = db.subtree_dir_ids(slot.dir_id, None)?;
        db.delete_aliases_of(slot.dir_id)?;
        db.delete_dir(slot.dir_id)?;
        tx.commit()?;

        for &child in &displaced {
            self.detach_edge(grand, child, Occurrence::Alias);
        }
        for &(child, old_parent) in &lifted {
            self.set_primary_parent(child, grand);
            self.detach_edge(old_parent, child, Occurrence::Primary);
            self.attach_edge(grand, child, Occurrence::Primary);
        }
        for dir in doomed {
            self.forget_dir(dir);
        }
        debug!(
            "Lifted {} directories from below {} to {}",
            lifted.len(),
            slot.dir_id,
            grand
        );
        Ok(())
    }

    // ── File edits ───────────────────────────────────────────────

    /// Drops files on `target`. Returns how many store rows changed; files
    /// already in place are skipped.
    pub fn drop_files(
        &self,
        db: &Database,
        target: NodeId,
        files: &[FileRef],
        action: FileDrop,
    ) -> Result<usize> {
        let slot = self.slot(target)?;
        if slot.dir_id == ROOT_DIR_ID {
            return Err(Error::Conflict("files cannot be dropped on the root".to_string()));
        }

        let tx = db.connection().unchecked_transaction()?;
        let mut changed = 0;
        for file in files {
            let record = db
                .get_file(file.file_id)?
                .ok_or_else(|| Error::NotFound(format!("file {}", file.file_id)))?;

            match overlay::plan_file_drop(slot.kind, action, file.source_virtual)? {
                FilePlan::InsertAlias => {
                    if !db.file_alias_exists(slot.dir_id, record.id)? {
                        db.insert_file_alias(slot.dir_id, record.id)?;
                        changed += 1;
                    }
                }
                FilePlan::MoveAlias { from } => {
                    if from == slot.dir_id {
                        continue;
                    }
                    if db.file_alias_exists(slot.dir_id, record.id)? {
                        db.delete_file_alias(from, record.id)?;
                    } else if db.move_file_alias(from, slot.dir_id, record.id)? == 0 {
                        return Err(Error::NotFound(format!(
                            "file {} is not listed under dir {}",
                            record.id, from
                        )));
                    }
                    changed += 1;
                }
                FilePlan::ChangeOwner => {
                    if record.dir_id == slot.dir_id {
                        continue;
                    }
                    if db.find_file(slot.dir_id, &record.file_name)?.is_some() {
                        return Err(Error::Conflict(format!(
                            "dir {} already holds {}",
                            slot.dir_id, record.file_name
                        )));
                    }
                    db.set_file_dir(record.id, slot.dir_id)?;
                    changed += 1;
                }
                FilePlan::CopyOwned => {
                    if db.find_file(slot.dir_id, &record.file_name)?.is_none() {
                        db.insert_file(slot.dir_id, &record.file_name, record.ext_id)?;
                        changed += 1;
                    }
                }
            }
        }
        tx.commit()?;

        info!(
            "Dropped {} files on dir {} ({:?}), {} changed",
            files.len(),
            slot.dir_id,
            action,
            changed
        );
        Ok(changed)
    }

    pub fn remove_file_alias(&self, db: &Database, id: NodeId, file_id: FileId) -> Result<()> {
        let slot = self.slot(id)?;
        if !slot.kind.is_virtual() {
            return Err(Error::Conflict(format!(
                "dir {} does not list file aliases",
                slot.dir_id
            )));
        }
        if db.delete_file_alias(slot.dir_id, file_id)? == 0 {
            return Err(Error::NotFound(format!(
                "file {} under dir {}",
                file_id, slot.dir_id
            )));
        }
        Ok(())
    }

    /// Deletes files picked from a listing. A file listed under a virtual
    /// folder only loses that listing; an owned file leaves the catalogue
    /// together with all its listings. Returns how many rows went away.
    pub fn delete_files(&self, db: &Database, files: &[FileRef]) -> Result<usize> {
        let tx = db.connection().unchecked_transaction()?;
        let mut removed = 0;
        for file in files {
            removed += match file.source_virtual {
                Some(dir_id) => db.delete_file_alias(dir_id, file.file_id)?,
                None => db.delete_file(file.file_id)?,
            };
        }
        tx.commit()?;

        info!("Deleted {} of {} files", removed, files.len());
        Ok(removed)
    }

    // ── Graph ────────────────────────────────────────────────────

    fn slot(&self, id: NodeId) -> Result<Slot> {
        let node = self
            .node(id)
            .ok_or_else(|| Error::NotFound(format!("tree node {}", id.0)))?;
        Ok(Slot {
            dir_id: node.dir_id,
            parent_dir: node.parent_dir,
            kind: node.kind,
            occurrence: node.occurrence,
        })
    }

    fn editable(&self, id: NodeId) -> Result<Slot> {
        if id == self.root {
            return Err(Error::Conflict("the root cannot be edited".to_string()));
        }
        self.slot(id)
    }

    fn has_edge(&self, parent_dir: DirId, dir_id: DirId) -> bool {
        self.edges
            .get(&parent_dir)
            .is_some_and(|edges| edges.iter().any(|&(child, _)| child == dir_id))
    }

    fn has_edge_of(&self, parent_dir: DirId, dir_id: DirId, occurrence: Occurrence) -> bool {
        self.edges
            .get(&parent_dir)
            .is_some_and(|edges| edges.contains(&(dir_id, occurrence)))
    }

    /// Whether `to` can be reached from `from` along any edge. A directory
    /// reaches itself.
    fn reaches(&self, from: DirId, to: DirId) -> bool {
        let mut seen = AHashSet::new();
        let mut stack = vec![from];
        while let Some(dir) = stack.pop() {
            if dir == to {
                return true;
            }
            if !seen.insert(dir) {
                continue;
            }
            if let Some(edges) = self.edges.get(&dir) {
                stack.extend(edges.iter().map(|&(child, _)| child));
            }
        }
        false
    }

    fn check_new_edge(&self, parent_dir: DirId, dir_id: DirId) -> Result<()> {
        if self.has_edge(parent_dir, dir_id) {
            return Err(Error::Conflict(format!(
                "dir {} already appears under {}",
                dir_id, parent_dir
            )));
        }
        if self.reaches(dir_id, parent_dir) {
            return Err(Error::Conflict(format!(
                "dir {} cannot be placed inside itself",
                dir_id
            )));
        }
        Ok(())
    }

    fn set_primary_parent(&mut self, dir_id: DirId, parent_id: DirId) {
        if let Some(info) = self.dirs.get_mut(&dir_id) {
            info.parent_id = parent_id;
        }
    }

    /// Adds an edge and materializes the child under every occurrence of
    /// the parent.
    fn attach_edge(&mut self, parent_dir: DirId, dir_id: DirId, occurrence: Occurrence) {
        self.edges
            .entry(parent_dir)
            .or_default()
            .push((dir_id, occurrence));
        for parent in self.occurrences(parent_dir).to_vec() {
            self.materialize(parent, dir_id, occurrence);
        }
    }

    /// Drops an edge and the child's subtree from every occurrence of the
    /// parent.
    fn detach_edge(&mut self, parent_dir: DirId, dir_id: DirId, occurrence: Occurrence) {
        if let Some(edges) = self.edges.get_mut(&parent_dir) {
            edges.retain(|&edge| edge != (dir_id, occurrence));
        }
        for parent in self.occurrences(parent_dir).to_vec() {
            let doomed: Vec<NodeId> = self
                .children(parent)
                .iter()
                .copied()
                .filter(|&child| {
                    self.node(child)
                        .is_some_and(|n| n.dir_id == dir_id && n.occurrence == occurrence)
                })
                .collect();
            for node in doomed {
                self.remove_subtree(node);
            }
        }
    }

    /// Removes every occurrence of a deleted directory and every edge
    /// touching it.
    fn forget_dir(&mut self, dir_id: DirId) {
        for node in self.occurrences(dir_id).to_vec() {
            self.remove_subtree(node);
        }
        self.dirs.remove(&dir_id);
        self.edges.remove(&dir_id);
        for edges in self.edges.values_mut() {
            edges.retain(|&(child, _)| child != dir_id);
        }
    }

    // ── Arena ────────────────────────────────────────────────────

    fn materialize(
        &mut self,
        parent: NodeId,
        dir_id: DirId,
        occurrence: Occurrence,
    ) -> Option<NodeId> {
        if self.on_path(parent, dir_id) {
            warn!(
                "Skipping cyclic edge: dir {} is already an ancestor of node {}",
                dir_id, parent.0
            );
            return None;
        }
        let info = self.dirs.get(&dir_id)?;
        let node = TreeNode {
            dir_id,
            parent_dir: self.node(parent)?.dir_id,
            kind: info.kind,
            label: info.label(),
            occurrence,
            parent: Some(parent),
            children: Vec::new(),
        };

        self.nodes.push(Some(node));
        let id = NodeId(self.nodes.len() - 1);
        self.insert_child(parent, id);
        self.occurrences.entry(dir_id).or_default().push(id);

        let edges = self.edges.get(&dir_id).cloned().unwrap_or_default();
        for (child, child_occurrence) in edges {
            self.materialize(id, child, child_occurrence);
        }
        Some(id)
    }

    /// Whether `dir_id` is shown by `node` or any of its ancestors.
    fn on_path(&self, node: NodeId, dir_id: DirId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.node(id) {
                Some(n) if n.dir_id == dir_id => return true,
                Some(n) => current = n.parent,
                None => return false,
            }
        }
        false
    }

    fn insert_child(&mut self, parent: NodeId, child: NodeId) {
        let Some(key) = self.node(child).map(TreeNode::sort_key) else {
            return;
        };
        let Some(siblings) = self.node(parent).map(TreeNode::children) else {
            return;
        };
        let pos = siblings.partition_point(|&sibling| {
            self.node(sibling)
                .map_or(true, |n| n.sort_key() < key)
        });
        if let Some(Some(p)) = self.nodes.get_mut(parent.0) {
            p.children.insert(pos, child);
        }
    }

    fn unlink_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(Some(p)) = self.nodes.get_mut(parent.0) {
            p.children.retain(|&c| c != child);
        }
    }

    fn remove_subtree(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.unlink_child(parent, id);
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current.0).and_then(Option::take) else {
                continue;
            };
            stack.extend(node.children);
            if let Some(list) = self.occurrences.get_mut(&node.dir_id) {
                list.retain(|&n| n != current);
                if list.is_empty() {
                    self.occurrences.remove(&node.dir_id);
                }
            }
        }
    }
}

fn clean_label(label: &str) -> Result<String> {
    let label = label.trim();
    if label.is_empty() {
        return Err(Error::Conflict("a folder label cannot be empty".to_string()));
    }
    Ok(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dir_id: DirId, parent_id: DirId, kind: DirKind, path: &str, via_alias: bool) -> TreeRow {
        TreeRow {
            dir_id,
            parent_id,
            kind,
            path: path.to_string(),
            via_alias,
        }
    }

    #[test]
    fn test_alias_subtree_is_shown_under_every_parent() {
        let rows = vec![
            row(1, 0, DirKind::Favorites, "Favorites", false),
            row(2, 0, DirKind::Real, "/lib", false),
            row(3, 2, DirKind::Real, "/lib/math", false),
            row(4, 1, DirKind::Virtual, "Reading", false),
            row(3, 4, DirKind::Real, "/lib/math", true),
            row(3, 1, DirKind::Real, "/lib/math", true),
        ];
        let tree = NamespaceTree::from_rows(&rows);

        assert_eq!(tree.occurrences(3).len(), 3);
        assert!(tree.primary_occurrence(3).is_some());
        let alias = tree.find_occurrence(4, 3).unwrap();
        assert_eq!(tree.node(alias).unwrap().occurrence, Occurrence::Alias);
        assert_eq!(tree.node(alias).unwrap().label, "math");
    }

    #[test]
    fn test_cyclic_alias_is_not_materialized() {
        let rows = vec![
            row(1, 0, DirKind::Virtual, "a", false),
            row(2, 1, DirKind::Virtual, "b", false),
            row(1, 2, DirKind::Virtual, "a", true),
        ];
        let tree = NamespaceTree::from_rows(&rows);

        assert_eq!(tree.occurrences(1).len(), 1);
        assert_eq!(tree.occurrences(2).len(), 1);
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn test_children_are_sorted_by_label() {
        let rows = vec![
            row(3, 0, DirKind::Real, "/zeta", false),
            row(1, 0, DirKind::Real, "/Alpha", false),
            row(2, 0, DirKind::Virtual, "beta", false),
        ];
        let tree = NamespaceTree::from_rows(&rows);
        let labels: Vec<&str> = tree
            .children(tree.root())
            .iter()
            .map(|&id| tree.node(id).unwrap().label.as_str())
            .collect();
        assert_eq!(labels, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_render_marks_kinds_and_aliases() {
        let rows = vec![
            row(1, 0, DirKind::Favorites, "Favorites", false),
            row(2, 0, DirKind::Real, "/lib", false),
            row(2, 1, DirKind::Real, "/lib", true),
        ];
        let rendered = NamespaceTree::from_rows(&rows).render();
        assert_eq!(
            rendered,
            "Favorites #1 [favorites]\n  lib #2 (alias)\nlib #2\n"
        );
    }

    #[test]
    fn test_edges_under_unknown_parents_are_ignored() {
        let rows = vec![row(5, 42, DirKind::Real, "/x", false)];
        let tree = NamespaceTree::from_rows(&rows);
        assert_eq!(tree.node_count(), 0);
        assert!(tree.occurrences(5).is_empty());
    }
}
