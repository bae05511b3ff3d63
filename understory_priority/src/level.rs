// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One priority level of a [`PriorityValue`](crate::PriorityValue).

use smallvec::SmallVec;

use crate::binding::{BindingEntry, BindingIndex};

/// Most levels carry zero, one, or two bindings.
const INLINE_BINDINGS: usize = 2;

/// All candidate values at a single priority.
///
/// A level holds a remembered direct value plus its bindings in attach order.
/// The value it offers is the most recently attached binding that currently
/// holds a value; only when no binding does is the direct value visible.
/// A direct value written while a binding is active therefore stays shadowed
/// until that binding unsets or goes away.
pub(crate) struct PriorityLevel<T> {
    pub(crate) direct_value: Option<T>,
    /// Sorted by index, since indices are assigned in attach order.
    bindings: SmallVec<[BindingEntry<T>; INLINE_BINDINGS]>,
}

impl<T> PriorityLevel<T> {
    pub(crate) fn new() -> Self {
        Self {
            direct_value: None,
            bindings: SmallVec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: BindingEntry<T>) {
        debug_assert!(
            self.bindings
                .last()
                .is_none_or(|last| last.index < entry.index),
            "binding indices must increase"
        );
        self.bindings.push(entry);
    }

    #[inline]
    fn find(&self, index: BindingIndex) -> Option<usize> {
        self.bindings
            .binary_search_by_key(&index, |entry| entry.index)
            .ok()
    }

    pub(crate) fn entry_mut(&mut self, index: BindingIndex) -> Option<&mut BindingEntry<T>> {
        let position = self.find(index)?;
        Some(&mut self.bindings[position])
    }

    pub(crate) fn contains(&self, index: BindingIndex) -> bool {
        self.find(index).is_some()
    }

    /// Detaches an entry. The caller decides where it gets dropped.
    pub(crate) fn remove(&mut self, index: BindingIndex) -> Option<BindingEntry<T>> {
        let position = self.find(index)?;
        Some(self.bindings.remove(position))
    }

    pub(crate) fn bindings(&self) -> &[BindingEntry<T>] {
        &self.bindings
    }

    pub(crate) fn active_entry(&self) -> Option<&BindingEntry<T>> {
        self.bindings
            .iter()
            .rev()
            .find(|entry| entry.value.is_some())
    }

    pub(crate) fn active_binding_index(&self) -> Option<BindingIndex> {
        self.active_entry().map(|entry| entry.index)
    }

    /// The raw (uncoerced) value this level offers, or `None` for unset.
    pub(crate) fn value(&self) -> Option<&T> {
        match self.active_entry() {
            Some(entry) => entry.value.as_ref(),
            None => self.direct_value.as_ref(),
        }
    }
}
