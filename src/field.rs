//! Field trees stored in an arena.
//!
//! `parent`/`children` edges form a tree of owned nodes. Cyclic
//! self-references are never children of their target: the builder creates a
//! childless alias node and records `alias -> original` in a separate table.
//! `matched_to`/`matched_from` are plain ids into the same arena.
use std::ops::{Index, IndexMut};

use indexmap::IndexMap;

use crate::options::FieldOptions;
use crate::signature::TypeSignature;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(usize);

#[derive(Debug, Clone)]
pub struct Field {
    /// Declared member name; empty for a root field.
    pub name: String,
    /// Parameter/result variable name, roots only.
    pub variable: String,
    pub signature: TypeSignature,
    pub tags: IndexMap<String, String>,
    pub parent: Option<FieldId>,
    pub children: Vec<FieldId>,
    pub matched_to: Option<FieldId>,
    pub matched_from: Option<FieldId>,
    pub options: FieldOptions,
}

impl Field {
    pub fn new(name: &str, signature: TypeSignature) -> Self {
        Field {
            name: name.to_string(),
            variable: String::new(),
            signature,
            tags: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            matched_to: None,
            matched_from: None,
            options: FieldOptions::default(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_matched(&self) -> bool {
        self.matched_to.is_some() || self.matched_from.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FieldArena {
    nodes: Vec<Field>,
    aliases: IndexMap<FieldId, FieldId>,
}

impl FieldArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `field` and, if it has a parent, append it to the parent's children.
    pub fn add(&mut self, field: Field) -> FieldId {
        let id = FieldId(self.nodes.len());
        let parent = field.parent;
        self.nodes.push(field);
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    /// Add a childless node standing in for an already built `target`.
    pub fn add_alias(&mut self, mut field: Field, target: FieldId) -> FieldId {
        field.children.clear();
        let id = self.add(field);
        self.aliases.insert(id, target);
        id
    }

    pub fn alias_of(&self, id: FieldId) -> Option<FieldId> {
        self.aliases.get(&id).copied()
    }

    pub fn is_alias(&self, id: FieldId) -> bool {
        self.aliases.contains_key(&id)
    }

    /// Id the next `add` will return.
    pub fn next_id(&self) -> FieldId {
        FieldId(self.nodes.len())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Fully-qualified dotted path: the root's base type name followed by
    /// member names, e.g. `models.User.Address.City`.
    pub fn path(&self, id: FieldId) -> String {
        let field = &self[id];
        match field.parent {
            None => field.signature.qualified_name(),
            Some(parent) => format!("{}.{}", self.path(parent), field.name),
        }
    }

    /// Pre-order walk of the *current* tree under `root`, root included.
    pub fn flatten(&self, root: FieldId) -> Vec<FieldId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self[id].children.iter().rev().copied());
        }
        out
    }

    /// Freeze a node: its subtree is dropped from the tree (nodes stay
    /// allocated but become unreachable).
    pub fn clear_children(&mut self, id: FieldId) {
        self.nodes[id.0].children.clear();
    }

    /// Remove `id` from its parent's children.
    pub fn detach(&mut self, id: FieldId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
    }

    /// Record `dest <- src`. Each side keeps its first partner only.
    pub fn link(&mut self, dest: FieldId, src: FieldId) {
        if self.nodes[src.0].matched_to.is_none() {
            self.nodes[src.0].matched_to = Some(dest);
        }
        if self.nodes[dest.0].matched_from.is_none() {
            self.nodes[dest.0].matched_from = Some(src);
        }
    }
}

impl Index<FieldId> for FieldArena {
    type Output = Field;

    fn index(&self, id: FieldId) -> &Field {
        &self.nodes[id.0]
    }
}

impl IndexMut<FieldId> for FieldArena {
    fn index_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.nodes[id.0]
    }
}
