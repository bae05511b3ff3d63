// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-object sparse storage of priority values.
//!
//! An object typically tracks only the handful of properties that actually
//! have a value source attached. [`PriorityStore`] keeps one
//! [`PriorityValue`] per such property in a sorted vector searched by
//! [`PropertyId`], so lookups are O(log n) over contiguous memory and small
//! objects never touch the heap for the index itself.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;
use smallvec::SmallVec;

use crate::diagnostics::PropertyValueDiagnostic;
use crate::priority::BindingPriority;
use crate::property::{Property, PropertyId};
use crate::value::PriorityValue;

/// Most objects have fewer than 8 properties with a value source attached.
const INLINE_CAPACITY: usize = 8;

/// A type-erased overview of one stored property, for listing in inspectors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PropertySummary {
    /// The property ID.
    pub id: PropertyId,
    /// The property's display name.
    pub name: &'static str,
    /// The priority of the effective value.
    pub priority: BindingPriority,
    /// Whether the property has an effective value.
    pub is_set: bool,
    /// Number of attached bindings.
    pub binding_count: usize,
}

/// Type-erased engine trait for heterogeneous storage.
trait ErasedPriorityValue: Any {
    fn as_any(&self) -> &dyn Any;
    fn summary(&self) -> PropertySummary;
}

impl<T: Clone + PartialEq + 'static> ErasedPriorityValue for PriorityValue<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn summary(&self) -> PropertySummary {
        let property = self.property();
        PropertySummary {
            id: property.id(),
            name: property.name(),
            priority: self.priority(),
            is_set: self.is_set(),
            binding_count: self.binding_count(),
        }
    }
}

impl dyn ErasedPriorityValue {
    fn downcast_ref<T: Clone + PartialEq + 'static>(&self) -> Option<&PriorityValue<T>> {
        self.as_any().downcast_ref()
    }
}

/// The priority values of one object, keyed by property.
///
/// # Example
///
/// ```rust
/// use understory_priority::{
///     BindingPriority, Just, Property, PropertyId, PriorityStore, PriorityValue,
/// };
///
/// const WIDTH: Property<f64> = Property::new(PropertyId::new(0), "Width");
/// const TEXT: Property<&str> = Property::new(PropertyId::new(1), "Text");
///
/// let mut store = PriorityStore::new(42_u32);
/// store
///     .get_or_insert_with(WIDTH, || PriorityValue::new(WIDTH))
///     .unwrap()
///     .set_value(100.0, BindingPriority::LocalValue);
/// store
///     .get_or_insert_with(TEXT, || PriorityValue::new(TEXT))
///     .unwrap()
///     .add_binding(Just::new("hello"), BindingPriority::Style);
///
/// assert_eq!(store.value(WIDTH), Some(100.0));
/// assert_eq!(store.value(TEXT), Some("hello"));
/// assert_eq!(store.len(), 2);
/// ```
pub struct PriorityStore<K> {
    /// Sorted by [`PropertyId`] for binary search lookup.
    entries: SmallVec<[(PropertyId, Box<dyn ErasedPriorityValue>); INLINE_CAPACITY]>,
    owner: K,
}

impl<K: Copy + Eq> PriorityStore<K> {
    /// Creates an empty store for the given owner key.
    #[must_use]
    pub fn new(owner: K) -> Self {
        Self {
            entries: SmallVec::new(),
            owner,
        }
    }

    /// Returns the owner key.
    #[must_use]
    #[inline]
    pub fn owner(&self) -> K {
        self.owner
    }

    /// Returns the number of stored properties.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no property is stored.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    fn find(&self, id: PropertyId) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&id, |(pid, _)| *pid)
    }

    /// Returns `true` if an engine is stored for `id`.
    #[must_use]
    pub fn contains(&self, id: PropertyId) -> bool {
        self.find(id).is_ok()
    }

    /// Returns the stored engine for `property`.
    ///
    /// `None` if nothing is stored, or if the stored engine has another value type.
    #[must_use]
    pub fn get<T: Clone + PartialEq + 'static>(
        &self,
        property: Property<T>,
    ) -> Option<&PriorityValue<T>> {
        let position = self.find(property.id()).ok()?;
        self.entries[position].1.downcast_ref()
    }

    /// Returns the engine for `property`, creating it with `make` if absent.
    ///
    /// `None` only if an engine with another value type is stored under the
    /// same [`PropertyId`].
    ///
    /// # Panics
    ///
    /// Panics if `make` builds an engine for a different property.
    pub fn get_or_insert_with<T, F>(
        &mut self,
        property: Property<T>,
        make: F,
    ) -> Option<&PriorityValue<T>>
    where
        T: Clone + PartialEq + 'static,
        F: FnOnce() -> PriorityValue<T>,
    {
        let position = match self.find(property.id()) {
            Ok(position) => position,
            Err(position) => {
                let value = make();
                assert_eq!(
                    value.property(),
                    property,
                    "engine built for the wrong property"
                );
                self.entries
                    .insert(position, (property.id(), Box::new(value)));
                position
            }
        };
        self.entries[position].1.downcast_ref()
    }

    /// Removes the engine for `id`, releasing all its subscriptions.
    ///
    /// Returns `true` if an engine was removed.
    pub fn remove(&mut self, id: PropertyId) -> bool {
        match self.find(id) {
            Ok(position) => {
                self.entries.remove(position);
                true
            }
            Err(_) => false,
        }
    }

    /// Returns the effective value of `property`, if stored and set.
    #[must_use]
    pub fn value<T: Clone + PartialEq + 'static>(&self, property: Property<T>) -> Option<T> {
        self.get(property).and_then(PriorityValue::value)
    }

    /// Returns the priority of the effective value of `id`.
    ///
    /// [`BindingPriority::Unset`] if nothing is stored.
    #[must_use]
    pub fn priority(&self, id: PropertyId) -> BindingPriority {
        self.find(id)
            .map(|position| self.entries[position].1.summary().priority)
            .unwrap_or(BindingPriority::Unset)
    }

    /// Returns a diagnostic snapshot for `property`.
    ///
    /// `None` if the property is not stored on this object.
    #[must_use]
    pub fn diagnostic<T: Clone + PartialEq + 'static>(
        &self,
        property: Property<T>,
    ) -> Option<PropertyValueDiagnostic<T>> {
        self.get(property).map(PriorityValue::diagnostic)
    }

    /// Returns the IDs of stored properties in ascending order.
    pub fn property_ids(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Returns a summary of every stored property in ascending ID order.
    pub fn summaries(&self) -> impl Iterator<Item = PropertySummary> + '_ {
        self.entries.iter().map(|(_, value)| value.summary())
    }
}

impl<K: fmt::Debug> fmt::Debug for PriorityStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityStore")
            .field("owner", &self.owner)
            .field(
                "entries",
                &self.entries.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            )
            .finish()
    }
}
