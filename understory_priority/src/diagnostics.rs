// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only snapshots for inspectors.
//!
//! These are plain data copied out of an engine, so holding one never keeps a
//! borrow open and offers no way to mutate the engine.

use alloc::string::String;
use alloc::vec::Vec;

use crate::binding::BindingIndex;
use crate::level::PriorityLevel;
use crate::priority::BindingPriority;
use crate::property::Property;

/// One binding as seen by an inspector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BindingDiagnostic<T> {
    /// The priority the binding is attached at.
    pub priority: BindingPriority,
    /// The binding's index; later bindings have larger indices.
    pub index: BindingIndex,
    /// The source's description.
    pub description: String,
    /// The latest value the source emitted, `None` if unset.
    pub value: Option<T>,
    /// Whether this binding supplies its level's value.
    pub is_active: bool,
}

/// One priority level as seen by an inspector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelDiagnostic<T> {
    /// The level's priority.
    pub priority: BindingPriority,
    /// The remembered direct value, which may be shadowed by a binding.
    pub direct_value: Option<T>,
    /// The index of the binding supplying the level's value, if any.
    pub active_binding_index: Option<BindingIndex>,
    /// Bindings in attach order.
    pub bindings: Vec<BindingDiagnostic<T>>,
}

impl<T: Clone> LevelDiagnostic<T> {
    pub(crate) fn capture(priority: BindingPriority, level: &PriorityLevel<T>) -> Self {
        let active = level.active_binding_index();
        Self {
            priority,
            direct_value: level.direct_value.clone(),
            active_binding_index: active,
            bindings: level
                .bindings()
                .iter()
                .map(|entry| BindingDiagnostic {
                    priority,
                    index: entry.index,
                    description: entry.description.clone(),
                    value: entry.value.clone(),
                    is_active: active == Some(entry.index),
                })
                .collect(),
        }
    }
}

/// A full snapshot of one [`PriorityValue`](crate::PriorityValue).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyValueDiagnostic<T> {
    /// The tracked property.
    pub property: Property<T>,
    /// The effective (coerced) value.
    pub value: Option<T>,
    /// The priority the effective value came from.
    pub priority: BindingPriority,
    /// Every level in use, in precedence order.
    pub levels: Vec<LevelDiagnostic<T>>,
}

impl<T> PropertyValueDiagnostic<T> {
    /// Returns the level at `priority`, if it has been used.
    #[must_use]
    pub fn level(&self, priority: BindingPriority) -> Option<&LevelDiagnostic<T>> {
        self.levels.iter().find(|level| level.priority == priority)
    }

    /// Iterates over all bindings, highest precedence first.
    pub fn bindings(&self) -> impl Iterator<Item = &BindingDiagnostic<T>> {
        self.levels.iter().flat_map(|level| level.bindings.iter())
    }

    /// Returns the binding that supplies the effective value, if it is bound.
    ///
    /// `None` when the property is unset or the effective value is a direct one.
    #[must_use]
    pub fn effective_binding(&self) -> Option<&BindingDiagnostic<T>> {
        self.level(self.priority)?
            .bindings
            .iter()
            .find(|binding| binding.is_active)
    }
}
