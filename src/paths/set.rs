//! @acp:module "Path Set"
//! @acp:summary "Per-method routing trie that rejects ambiguous or duplicate registrations"
//! @acp:domain parser
//! @acp:layer core

use std::collections::BTreeMap;

use super::{Path, PathError, Segment, SegmentType};

/// Method bucket that matches every HTTP method.
pub const WILDCARD_METHOD: &str = "*";

/// @acp:summary "Conflict-detecting set of (method, path) registrations"
#[derive(Debug, Default)]
pub struct PathSet {
    methods: BTreeMap<String, Node>,
}

#[derive(Debug, Default)]
struct Node {
    children: Vec<(Segment, Node)>,
    terminal: Option<Path>,
}

impl PathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` for `method`.
    ///
    /// Other buckets are only checked; the new branch goes into `method`'s
    /// bucket, which is walked last so a conflict leaves the set unchanged.
    pub fn add(&mut self, method: &str, path: &Path) -> Result<(), PathError> {
        let others: Vec<String> = if method == WILDCARD_METHOD {
            self.methods
                .keys()
                .filter(|m| m.as_str() != WILDCARD_METHOD)
                .cloned()
                .collect()
        } else {
            vec![WILDCARD_METHOD.to_string()]
        };

        for other in &others {
            if let Some(root) = self.methods.get_mut(other) {
                root.walk(path, false)?;
            }
        }
        self.methods
            .entry(method.to_string())
            .or_default()
            .walk(path, true)
    }

    /// Number of registered (method, path) pairs.
    pub fn len(&self) -> usize {
        self.methods.values().map(Node::count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Node {
    fn walk(&mut self, path: &Path, insert: bool) -> Result<(), PathError> {
        let mut node = self;
        for seg in &path.segments {
            let mut next = None;
            for (idx, (existing, child)) in node.children.iter().enumerate() {
                match (existing.kind, seg.kind) {
                    (SegmentType::Literal, SegmentType::Literal) => {
                        if existing.value == seg.value {
                            next = Some(idx);
                            break;
                        }
                    }
                    (a, b) if a == b => {
                        next = Some(idx);
                        break;
                    }
                    _ => return Err(conflict(path, seg, existing, child)),
                }
            }

            node = match next {
                Some(idx) => &mut node.children[idx].1,
                None if insert => {
                    let idx = node.children.len();
                    let mut key = seg.clone();
                    key.value_type = None;
                    node.children.push((key, Node::default()));
                    &mut node.children[idx].1
                }
                // Nothing registered along this branch.
                None => return Ok(()),
            };
        }

        if let Some(existing) = &node.terminal {
            return Err(PathError {
                pos: path.pos.clone(),
                message: format!(
                    "duplicate path '{}' (conflicts with '{}')",
                    path, existing
                ),
            });
        }
        if insert {
            node.terminal = Some(path.clone());
        }
        Ok(())
    }

    fn any_path(&self) -> Option<&Path> {
        self.terminal
            .as_ref()
            .or_else(|| self.children.iter().find_map(|(_, child)| child.any_path()))
    }

    fn count(&self) -> usize {
        usize::from(self.terminal.is_some())
            + self.children.iter().map(|(_, c)| c.count()).sum::<usize>()
    }
}

fn conflict(path: &Path, seg: &Segment, existing: &Segment, child: &Node) -> PathError {
    let other = child
        .any_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| existing.to_string());
    let message = if seg.is_literal() {
        format!(
            "cannot combine path '{}' with {} of path '{}'",
            path,
            existing.describe(),
            other
        )
    } else {
        format!("cannot combine {} with path '{}'", seg.describe(), other)
    };
    PathError {
        pos: path.pos.clone(),
        message,
    }
}
