//! Node name admission.
//!
//! Before a node is created or renamed, its proposed name goes through a
//! [`ValidateNodeName`]. Validators are pure predicates; combine them with
//! [`ValidateNodeNameExt::and`].

use crate::config::NameRules;
use std::collections::HashSet;

/// Predicate deciding whether a proposed node name may be used.
pub trait ValidateNodeName {
    fn node_name_acceptable(&self, name: &str) -> bool;
}

impl<F> ValidateNodeName for F
where
    F: Fn(&str) -> bool,
{
    fn node_name_acceptable(&self, name: &str) -> bool {
        self(name)
    }
}

impl ValidateNodeName for NameRules {
    fn node_name_acceptable(&self, name: &str) -> bool {
        if name.trim().is_empty() || name.trim() != name {
            return false;
        }

        if name.chars().count() > self.max_length {
            return false;
        }

        name.chars().all(|c| {
            if c.is_control() {
                false
            } else if c.is_whitespace() {
                self.allow_spaces && c == ' '
            } else {
                true
            }
        })
    }
}

/// Rejects names already used by another node.
#[derive(Debug, Clone, Default)]
pub struct UniqueName<'a> {
    taken: HashSet<&'a str>,
}

impl<'a> UniqueName<'a> {
    pub fn new(taken: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            taken: taken.into_iter().collect(),
        }
    }
}

impl ValidateNodeName for UniqueName<'_> {
    fn node_name_acceptable(&self, name: &str) -> bool {
        !self.taken.contains(name)
    }
}

/// Both validators must accept the name
#[derive(Debug, Clone)]
pub struct Both<A, B>(pub A, pub B);

impl<A: ValidateNodeName, B: ValidateNodeName> ValidateNodeName for Both<A, B> {
    fn node_name_acceptable(&self, name: &str) -> bool {
        self.0.node_name_acceptable(name) && self.1.node_name_acceptable(name)
    }
}

pub trait ValidateNodeNameExt: ValidateNodeName + Sized {
    fn and<B: ValidateNodeName>(self, other: B) -> Both<Self, B> {
        Both(self, other)
    }
}

impl<V: ValidateNodeName> ValidateNodeNameExt for V {}
