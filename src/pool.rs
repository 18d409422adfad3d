//! Flattened, name-indexed view over a [`Param`] tree.
//!
//! Every descendant is indexed under its local name, so nodes sharing a name
//! at different depths land in one bucket and a short key such as `email`
//! targets all of them. Dotted keys (`user.email`) start from the bucket of the
//! first segment and then walk direct children; `*` stands for every child of
//! the current node, or for every indexed node when it leads the key.
use indexmap::IndexMap;

use crate::param::Param;

pub const WILDCARD: &str = "*";

#[derive(Debug)]
pub struct ParamPool<'a> {
    index: IndexMap<&'a str, Vec<&'a Param>>,
}

impl<'a> ParamPool<'a> {
    pub fn new(root: &'a Param) -> Self {
        let mut pool = Self { index: IndexMap::new() };
        pool.add_children(root);
        pool
    }

    fn add_children(&mut self, p: &'a Param) {
        for child in p.child_params() {
            self.index.entry(child.name()).or_default().push(child);
            self.add_children(child);
        }
    }

    /// Every indexed node, bucket by bucket in first-seen order.
    pub fn all_params(&self) -> Vec<&'a Param> {
        self.index.values().flatten().copied().collect()
    }

    /// Nodes a key resolves to, or `None` when it resolves to nothing.
    pub fn get_params(&self, key: &str) -> Option<Vec<&'a Param>> {
        if key == WILDCARD {
            return Some(self.all_params());
        }
        let mut segments = key.split('.');
        let first = segments.next()?;
        let rest: Vec<&str> = segments.collect();
        let starts = if first == WILDCARD {
            self.all_params()
        } else {
            self.index.get(first)?.clone()
        };
        if rest.is_empty() {
            return Some(starts);
        }
        let mut found = Vec::new();
        for p in starts {
            descend(p, &rest, &mut found);
        }
        if found.is_empty() { None } else { Some(found) }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_params(key).is_some()
    }

    /// Number of distinct local names.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn descend<'a>(p: &'a Param, segments: &[&str], out: &mut Vec<&'a Param>) {
    let Some((head, tail)) = segments.split_first() else {
        out.push(p);
        return;
    };
    if *head == WILDCARD {
        for child in p.child_params() {
            descend(child, tail, out);
        }
    } else if let Some(child) = p.get_child(head) {
        descend(child, tail, out);
    }
}
