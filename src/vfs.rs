//! In-memory virtual filesystem.
//!
//! Nodes live in a flat arena indexed by [`NodeId`]; parent links are
//! back-indices into the same arena, so the tree carries no reference
//! cycles. All operations take `/`-delimited absolute paths — relative
//! paths are resolved against a process working directory before they
//! reach this layer.

use std::fmt;
use std::rc::Rc;
use std::time::SystemTime;

use thiserror::Error;
use tracing::debug;

use crate::kernel::Program;

/// Index of a node in the arena. The root is always [`Vfs::ROOT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// A filesystem path failure, surfaced to programs verbatim. Paths in the
/// messages name the offending node, not necessarily the full requested
/// path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("{0} is a file")]
    IsAFile(String),
    #[error("{0} not exists")]
    NotExists(String),
    #[error("Already exists")]
    AlreadyExists,
}

/// Ownership and permission metadata carried by every node. Purely
/// informational — nothing enforces permissions.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    pub permissions: String,
    pub owner: String,
    pub owner_group: String,
    pub created_at: SystemTime,
}

impl NodeMeta {
    fn new(permissions: &str) -> Self {
        Self {
            permissions: permissions.to_string(),
            owner: "guest".to_string(),
            owner_group: "guest".to_string(),
            created_at: SystemTime::now(),
        }
    }
}

pub enum NodeKind {
    Root { children: Vec<NodeId> },
    Directory { children: Vec<NodeId> },
    File { content: String },
    Executable { program: Program },
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Root { children } => {
                f.debug_struct("Root").field("children", children).finish()
            }
            NodeKind::Directory { children } => f
                .debug_struct("Directory")
                .field("children", children)
                .finish(),
            NodeKind::File { content } => {
                f.debug_struct("File").field("content", content).finish()
            }
            NodeKind::Executable { .. } => f.debug_struct("Executable").finish_non_exhaustive(),
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub meta: NodeMeta,
    pub kind: NodeKind,
}

impl Node {
    pub fn is_directory_like(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Root { .. } | NodeKind::Directory { .. }
        )
    }
}

#[derive(Debug)]
pub struct Vfs {
    nodes: Vec<Node>,
}

impl Vfs {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                name: String::new(),
                parent: None,
                meta: NodeMeta::new("rw-rw-rw-"),
                kind: NodeKind::Root {
                    children: Vec::new(),
                },
            }],
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Root { children } | NodeKind::Directory { children } => children,
            _ => &[],
        }
    }

    fn children_mut(&mut self, id: NodeId) -> Option<&mut Vec<NodeId>> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Root { children } | NodeKind::Directory { children } => Some(children),
            _ => None,
        }
    }

    /// First child of `dir` named `name`, in insertion order.
    pub fn child_by_name(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        self.children(dir)
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].name == name)
    }

    fn segments(path: &str) -> Vec<&str> {
        path.split('/').filter(|s| !s.is_empty()).collect()
    }

    /// Path of `id` for error messages: empty for the root, so that
    /// appending `/segment` always yields an absolute path.
    fn path_prefix(&self, id: NodeId) -> String {
        if id == Self::ROOT {
            String::new()
        } else {
            self.get_path(id)
        }
    }

    /// Step from `current` into `segment`, requiring the child to exist
    /// and be directory-like.
    fn step(&self, current: NodeId, segment: &str) -> Result<NodeId, PathError> {
        match self.child_by_name(current, segment) {
            Some(child) if self.nodes[child.0].is_directory_like() => Ok(child),
            Some(child) => Err(PathError::IsAFile(self.get_path(child))),
            None => Err(PathError::NotExists(format!(
                "{}/{}",
                self.path_prefix(current),
                segment
            ))),
        }
    }

    /// Walk `path` from the root. The final segment is returned if
    /// present, absent otherwise; only intermediate segments can fail.
    pub fn find(&self, path: &str) -> Result<Option<NodeId>, PathError> {
        let segments = Self::segments(path);
        let Some((last, intermediate)) = segments.split_last() else {
            return Ok(Some(Self::ROOT));
        };
        let mut current = Self::ROOT;
        for segment in intermediate {
            current = self.step(current, segment)?;
        }
        Ok(self.child_by_name(current, last))
    }

    /// Like [`Vfs::find`], but every segment including the last must
    /// exist and be directory-like.
    pub fn find_directory(&self, path: &str) -> Result<NodeId, PathError> {
        let mut current = Self::ROOT;
        for segment in Self::segments(path) {
            current = self.step(current, segment)?;
        }
        Ok(current)
    }

    /// Create every missing directory along `path` (mkdir -p). Returns
    /// the last directory created, or `None` if the full path already
    /// existed — calling twice with the same path is idempotent.
    pub fn make_directory(&mut self, path: &str) -> Result<Option<NodeId>, PathError> {
        let mut current = Self::ROOT;
        let mut created = None;
        for segment in Self::segments(path) {
            match self.child_by_name(current, segment) {
                Some(child) if self.nodes[child.0].is_directory_like() => current = child,
                Some(child) => return Err(PathError::IsAFile(self.get_path(child))),
                None => {
                    let id = self.push_directory(segment, current);
                    debug!(path, name = segment, "mkdir");
                    created = Some(id);
                    current = id;
                }
            }
        }
        Ok(created)
    }

    /// Create missing parent directories, then append a new file node
    /// under the final parent. No existence check is made on the final
    /// name, so duplicate siblings are possible.
    pub fn make_file(
        &mut self,
        path: &str,
        content: impl Into<String>,
    ) -> Result<NodeId, PathError> {
        let segments = Self::segments(path);
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(PathError::AlreadyExists);
        };
        let parent = self.ensure_directories(intermediate)?;
        debug!(path, "create file");
        Ok(self.push_node(
            last,
            parent,
            NodeKind::File {
                content: content.into(),
            },
        ))
    }

    /// Same creation pattern as [`Vfs::make_file`], but the new node is
    /// an executable bound to `program`.
    pub fn make_sys_file(&mut self, path: &str, program: Program) -> Result<NodeId, PathError> {
        let segments = Self::segments(path);
        let Some((last, intermediate)) = segments.split_last() else {
            return Err(PathError::AlreadyExists);
        };
        let parent = self.ensure_directories(intermediate)?;
        debug!(path, "install executable");
        Ok(self.push_node(last, parent, NodeKind::Executable { program }))
    }

    fn ensure_directories(&mut self, segments: &[&str]) -> Result<NodeId, PathError> {
        let mut current = Self::ROOT;
        for segment in segments {
            match self.child_by_name(current, segment) {
                Some(child) if self.nodes[child.0].is_directory_like() => current = child,
                Some(child) => return Err(PathError::IsAFile(self.get_path(child))),
                None => current = self.push_directory(segment, current),
            }
        }
        Ok(current)
    }

    fn push_directory(&mut self, name: &str, parent: NodeId) -> NodeId {
        self.push_node(
            name,
            parent,
            NodeKind::Directory {
                children: Vec::new(),
            },
        )
    }

    fn push_node(&mut self, name: &str, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            parent: Some(parent),
            meta: NodeMeta::new("rw-r--r--"),
            kind,
        });
        if let Some(children) = self.children_mut(parent) {
            children.push(id);
        }
        id
    }

    /// Unlink the node at `path` from its parent, if it exists and has
    /// one. The arena slot itself is retired, not reused.
    pub fn remove(&mut self, path: &str) -> Result<(), PathError> {
        let Some(id) = self.find(path)? else {
            return Ok(());
        };
        if let Some(parent) = self.nodes[id.0].parent {
            debug!(path, "remove");
            if let Some(children) = self.children_mut(parent) {
                children.retain(|&c| c != id);
            }
        }
        Ok(())
    }

    /// Absolute path of `id`, rebuilt from parent back-indices.
    pub fn get_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if node.parent.is_some() {
                segments.push(node.name.as_str());
            }
            current = node.parent;
        }
        if segments.is_empty() {
            "/".to_string()
        } else {
            segments.reverse();
            format!("/{}", segments.join("/"))
        }
    }

    /// File content at `id`, if the node is a plain file.
    pub fn read_file(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::File { content } => Some(content),
            _ => None,
        }
    }

    /// Replace a file's content. No-op for non-file nodes.
    pub fn write_file(&mut self, id: NodeId, content: impl Into<String>) {
        if let NodeKind::File { content: existing } = &mut self.nodes[id.0].kind {
            *existing = content.into();
        }
    }

    /// Append to a file's content. No-op for non-file nodes.
    pub fn append_file(&mut self, id: NodeId, chunk: &str) {
        if let NodeKind::File { content } = &mut self.nodes[id.0].kind {
            content.push_str(chunk);
        }
    }

    /// The program bound to an executable node.
    pub fn program(&self, id: NodeId) -> Option<Program> {
        match &self.nodes[id.0].kind {
            NodeKind::Executable { program } => Some(Rc::clone(program)),
            _ => None,
        }
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_missing_final_segment_is_absent() {
        let mut vfs = Vfs::new();
        vfs.make_directory("/home").unwrap();
        assert_eq!(vfs.find("/home/ghost"), Ok(None));
    }

    #[test]
    fn test_find_missing_intermediate_errors() {
        let vfs = Vfs::new();
        assert_eq!(
            vfs.find("/no/such/path"),
            Err(PathError::NotExists("/no".into()))
        );
    }

    #[test]
    fn test_find_through_file_errors() {
        let mut vfs = Vfs::new();
        vfs.make_file("/readme", "hi").unwrap();
        assert_eq!(
            vfs.find("/readme/inner"),
            Err(PathError::IsAFile("/readme".into()))
        );
    }

    #[test]
    fn test_find_root() {
        let vfs = Vfs::new();
        assert_eq!(vfs.find("/"), Ok(Some(Vfs::ROOT)));
    }

    #[test]
    fn test_find_directory_rejects_file() {
        let mut vfs = Vfs::new();
        vfs.make_file("/notes.txt", "").unwrap();
        assert_eq!(
            vfs.find_directory("/notes.txt"),
            Err(PathError::IsAFile("/notes.txt".into()))
        );
        assert_eq!(
            vfs.find_directory("/missing"),
            Err(PathError::NotExists("/missing".into()))
        );
    }

    #[test]
    fn test_find_directory_errors_name_the_walked_node() {
        let mut vfs = Vfs::new();
        vfs.make_directory("/a").unwrap();
        assert_eq!(
            vfs.find_directory("/a/missing/deeper"),
            Err(PathError::NotExists("/a/missing".into()))
        );
    }

    #[test]
    fn test_make_directory_creates_all_segments() {
        let mut vfs = Vfs::new();
        let created = vfs.make_directory("/a/b/c").unwrap();
        assert!(created.is_some());
        assert!(vfs.find_directory("/a").is_ok());
        assert!(vfs.find_directory("/a/b").is_ok());
        assert!(vfs.find_directory("/a/b/c").is_ok());
    }

    #[test]
    fn test_make_directory_is_idempotent() {
        let mut vfs = Vfs::new();
        vfs.make_directory("/a/b").unwrap();
        assert_eq!(vfs.make_directory("/a/b"), Ok(None));
    }

    #[test]
    fn test_make_directory_through_file_errors() {
        let mut vfs = Vfs::new();
        vfs.make_file("/blocker", "").unwrap();
        assert_eq!(
            vfs.make_directory("/blocker/sub"),
            Err(PathError::IsAFile("/blocker".into()))
        );
    }

    #[test]
    fn test_make_file_creates_parents_and_appends() {
        let mut vfs = Vfs::new();
        let id = vfs.make_file("/home/guest/hello.txt", "hi").unwrap();
        assert_eq!(vfs.read_file(id), Some("hi"));
        assert!(vfs.find_directory("/home/guest").is_ok());
    }

    #[test]
    fn test_make_file_allows_duplicate_siblings() {
        let mut vfs = Vfs::new();
        let first = vfs.make_file("/dup.txt", "one").unwrap();
        let second = vfs.make_file("/dup.txt", "two").unwrap();
        assert_ne!(first, second);
        assert_eq!(vfs.children(Vfs::ROOT).len(), 2);
        // Lookup resolves to the first sibling.
        assert_eq!(vfs.find("/dup.txt"), Ok(Some(first)));
    }

    #[test]
    fn test_remove_unlinks_by_identity() {
        let mut vfs = Vfs::new();
        let first = vfs.make_file("/dup.txt", "one").unwrap();
        let second = vfs.make_file("/dup.txt", "two").unwrap();
        vfs.remove("/dup.txt").unwrap();
        assert_eq!(vfs.find("/dup.txt"), Ok(Some(second)));
        assert!(!vfs.children(Vfs::ROOT).contains(&first));
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let mut vfs = Vfs::new();
        assert_eq!(vfs.remove("/ghost"), Ok(()));
    }

    #[test]
    fn test_get_path() {
        let mut vfs = Vfs::new();
        let id = vfs.make_file("/a/b/file.txt", "").unwrap();
        assert_eq!(vfs.get_path(id), "/a/b/file.txt");
        assert_eq!(vfs.get_path(Vfs::ROOT), "/");
    }

    #[test]
    fn test_node_metadata_defaults() {
        let mut vfs = Vfs::new();
        let id = vfs.make_file("/f", "").unwrap();
        assert_eq!(vfs.node(id).meta.permissions, "rw-r--r--");
        assert_eq!(vfs.node(id).meta.owner, "guest");
        assert_eq!(vfs.node(Vfs::ROOT).meta.permissions, "rw-rw-rw-");
    }

    #[test]
    fn test_write_and_append_file() {
        let mut vfs = Vfs::new();
        let id = vfs.make_file("/f", "start").unwrap();
        vfs.append_file(id, " more");
        assert_eq!(vfs.read_file(id), Some("start more"));
        vfs.write_file(id, "fresh");
        assert_eq!(vfs.read_file(id), Some("fresh"));
    }
}
