// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The priority resolution engine.
//!
//! [`PriorityValue`] owns the levels for one property on one object and keeps
//! the effective value current as values are set and bindings attach, emit,
//! complete, fail, or are disposed.
//!
//! # Resolution
//!
//! Levels are kept sorted by [`BindingPriority`]. Resolution walks them in
//! precedence order and takes the first level offering a value (see
//! [`PriorityValue::add_binding`] for what a level offers). The winner is
//! passed through the coercion callback, if any, and compared with the cached
//! effective value; the owner hears about it only when the value differs.
//!
//! # Re-entrancy
//!
//! The engine never holds its internal borrow while running source code or
//! the owner callback, so both may call back into it. Operations issued from
//! inside the owner callback are applied immediately, but their
//! re-resolution is folded into the notification loop already running: the
//! owner receives a second, separate notification after the first returns
//! instead of a nested one.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use smallvec::SmallVec;

use crate::binding::{BindingEntry, BindingHandle, BindingIndex, BindingObserver};
use crate::diagnostics::{BindingDiagnostic, LevelDiagnostic, PropertyValueDiagnostic};
use crate::error::SourceError;
use crate::level::PriorityLevel;
use crate::priority::BindingPriority;
use crate::property::Property;
use crate::source::ValueSource;

/// Inline capacity for levels; few properties use more than a handful.
const INLINE_LEVELS: usize = 4;

/// Callback that validates or clamps a candidate effective value.
///
/// It must be total over `T`, idempotent, and must not touch the engine that
/// invokes it.
pub type CoerceValueCallback<T> = Box<dyn Fn(T) -> T>;

/// Receives effective value changes from a [`PriorityValue`].
///
/// Implemented for any `Fn(Property<T>, BindingPriority, Option<&T>, Option<&T>)`.
pub trait PriorityValueOwner<T> {
    /// Called once per change of the effective value.
    ///
    /// `priority` is the priority the new value came from
    /// ([`BindingPriority::Unset`] when `new_value` is `None`). The engine
    /// already reports the new value when this runs.
    ///
    /// Only a change of the value is reported. When the same value starts
    /// coming from another priority, for example because an equal value is
    /// set at a higher one, this is not called; read
    /// [`PriorityValue::priority`] to track the priority itself.
    fn changed(
        &self,
        property: Property<T>,
        priority: BindingPriority,
        old_value: Option<&T>,
        new_value: Option<&T>,
    );
}

impl<T, F> PriorityValueOwner<T> for F
where
    F: Fn(Property<T>, BindingPriority, Option<&T>, Option<&T>),
{
    fn changed(
        &self,
        property: Property<T>,
        priority: BindingPriority,
        old_value: Option<&T>,
        new_value: Option<&T>,
    ) {
        self(property, priority, old_value, new_value);
    }
}

/// Why a binding left its level.
#[derive(Debug)]
pub(crate) enum RemovalCause {
    Disposed,
    Completed,
    #[cfg_attr(
        not(feature = "tracing"),
        allow(dead_code, reason = "the error is only read by tracing events")
    )]
    Failed(SourceError),
}

pub(crate) struct Shared<T> {
    property: Property<T>,
    owner: Option<Rc<dyn PriorityValueOwner<T>>>,
    coerce: Option<CoerceValueCallback<T>>,
    /// Sorted by priority; created on first use and never removed.
    levels: SmallVec<[(BindingPriority, PriorityLevel<T>); INLINE_LEVELS]>,
    next_index: u64,
    value: Option<T>,
    priority: BindingPriority,
    /// Set while the owner callback runs.
    notifying: bool,
    /// A re-resolution was requested while `notifying`.
    pending: bool,
}

impl<T: Clone> Shared<T> {
    #[inline]
    fn find_level(&self, priority: BindingPriority) -> Result<usize, usize> {
        self.levels
            .binary_search_by_key(&priority, |(level_priority, _)| *level_priority)
    }

    fn level(&self, priority: BindingPriority) -> Option<&PriorityLevel<T>> {
        let position = self.find_level(priority).ok()?;
        Some(&self.levels[position].1)
    }

    fn level_mut(&mut self, priority: BindingPriority) -> Option<&mut PriorityLevel<T>> {
        let position = self.find_level(priority).ok()?;
        Some(&mut self.levels[position].1)
    }

    fn level_or_insert(&mut self, priority: BindingPriority) -> &mut PriorityLevel<T> {
        let position = match self.find_level(priority) {
            Ok(position) => position,
            Err(position) => {
                self.levels
                    .insert(position, (priority, PriorityLevel::new()));
                position
            }
        };
        &mut self.levels[position].1
    }

    /// Resolves from scratch: first level with a value wins, then coercion.
    fn resolve(&self) -> (BindingPriority, Option<T>) {
        for (priority, level) in &self.levels {
            if let Some(raw) = level.value() {
                let value = match &self.coerce {
                    Some(coerce) => coerce(raw.clone()),
                    None => raw.clone(),
                };
                return (*priority, Some(value));
            }
        }
        (BindingPriority::Unset, None)
    }

    fn diagnostic(&self) -> PropertyValueDiagnostic<T> {
        PropertyValueDiagnostic {
            property: self.property,
            value: self.value.clone(),
            priority: self.priority,
            levels: self
                .levels
                .iter()
                .map(|(priority, level)| LevelDiagnostic::capture(*priority, level))
                .collect(),
        }
    }
}

/// The effective value of one property on one object.
///
/// Values arrive at a [`BindingPriority`] either as direct values
/// ([`set_value`](Self::set_value)) or from live sources
/// ([`add_binding`](Self::add_binding)). Every operation re-resolves
/// synchronously before it returns, and the optional owner is notified once
/// per actual change.
///
/// The engine is single-threaded and not `Clone`: it belongs to exactly one
/// property slot. Sources and handles only hold weak references to it, and
/// dropping it releases every remaining subscription.
///
/// # Example
///
/// ```rust
/// use understory_priority::{
///     BindingPriority, Property, PropertyId, PriorityValue, Subject,
/// };
///
/// const TEXT: Property<&str> = Property::new(PropertyId::new(0), "Text");
///
/// let value = PriorityValue::new(TEXT);
/// assert_eq!(value.value(), None);
///
/// let style = Subject::with_value("styled");
/// value.add_binding(style.clone(), BindingPriority::Style);
/// assert_eq!(value.value(), Some("styled"));
///
/// value.set_value("local", BindingPriority::LocalValue);
/// assert_eq!(value.value(), Some("local"));
/// assert_eq!(value.priority(), BindingPriority::LocalValue);
///
/// value.clear_value(BindingPriority::LocalValue);
/// assert_eq!(value.value(), Some("styled"));
/// ```
///
/// # Panics
///
/// Operations panic if called from inside the coercion callback, or from
/// `Clone`/`PartialEq`/`Drop` of `T`, since the engine is mid-update there.
pub struct PriorityValue<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T: Clone + PartialEq + 'static> PriorityValue<T> {
    /// Creates an engine for `property` with no owner and no coercion.
    #[must_use]
    pub fn new(property: Property<T>) -> Self {
        Self::from_shared(Rc::new(RefCell::new(Shared {
            property,
            owner: None,
            coerce: None,
            levels: SmallVec::new(),
            next_index: 0,
            value: None,
            priority: BindingPriority::Unset,
            notifying: false,
            pending: false,
        })))
    }

    /// Sets the owner that receives change notifications.
    #[must_use]
    pub fn with_owner(self, owner: impl PriorityValueOwner<T> + 'static) -> Self {
        self.shared.borrow_mut().owner = Some(Rc::new(owner));
        self
    }

    /// Sets the coercion callback applied to every candidate effective value.
    ///
    /// If the callback depends on outside state, call
    /// [`revalidate`](Self::revalidate) when that state changes.
    #[must_use]
    pub fn with_coerce<F>(self, coerce: F) -> Self
    where
        F: Fn(T) -> T + 'static,
    {
        self.shared.borrow_mut().coerce = Some(Box::new(coerce));
        self.update();
        self
    }

    pub(crate) fn from_shared(shared: Rc<RefCell<Shared<T>>>) -> Self {
        Self { shared }
    }

    fn downgrade(&self) -> Weak<RefCell<Shared<T>>> {
        Rc::downgrade(&self.shared)
    }

    /// The tracked property.
    #[must_use]
    pub fn property(&self) -> Property<T> {
        self.shared.borrow().property
    }

    /// The effective value, or `None` if no level offers one.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.shared.borrow().value.clone()
    }

    /// The priority the effective value came from.
    #[must_use]
    pub fn priority(&self) -> BindingPriority {
        self.shared.borrow().priority
    }

    /// Returns `true` if some level offers a value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.shared.borrow().value.is_some()
    }

    /// Returns `true` if a coercion callback is configured.
    #[must_use]
    pub fn has_coerce(&self) -> bool {
        self.shared.borrow().coerce.is_some()
    }

    /// Attaches `source` at `priority`.
    ///
    /// Within a level, the most recently attached binding that currently
    /// holds a value supplies the level's value; an older binding emitting
    /// never displaces it. A level's direct value is only visible while none
    /// of its bindings holds a value.
    ///
    /// The source is subscribed synchronously and may emit before this
    /// returns; those emissions are handled like any later one.
    pub fn add_binding<S>(&self, source: S, priority: BindingPriority) -> BindingHandle<T>
    where
        S: ValueSource<T>,
    {
        let description = source.description();
        let index = {
            let mut shared = self.shared.borrow_mut();
            let index = BindingIndex::new(shared.next_index);
            shared.next_index += 1;
            shared
                .level_or_insert(priority)
                .push(BindingEntry::new(index, description));
            index
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            message = "priority_value.binding_added",
            property = self.property().name(),
            priority = priority.name(),
            index = index.get()
        );

        let subscription = source.subscribe(BindingObserver::new(self.downgrade(), priority, index));

        // The source may have completed during `subscribe`, in which case the
        // entry is already gone and the subscription is released right here.
        let orphaned = match self
            .shared
            .borrow_mut()
            .level_mut(priority)
            .and_then(|level| level.entry_mut(index))
        {
            Some(entry) => {
                entry.subscription = Some(subscription);
                None
            }
            None => Some(subscription),
        };
        drop(orphaned);

        self.update();
        BindingHandle::new(self.downgrade(), priority, index)
    }

    /// Sets the direct value at `priority`.
    ///
    /// If a binding at the same priority currently holds a value, it keeps
    /// supplying the level; the direct value is remembered and becomes
    /// visible once no binding there holds a value.
    pub fn set_value(&self, value: T, priority: BindingPriority) {
        self.shared.borrow_mut().level_or_insert(priority).direct_value = Some(value);
        self.update();
    }

    /// Clears the direct value at `priority`. Bindings are unaffected.
    pub fn clear_value(&self, priority: BindingPriority) {
        let cleared = self
            .shared
            .borrow_mut()
            .level_mut(priority)
            .and_then(|level| level.direct_value.take());
        if cleared.is_some() {
            drop(cleared);
            self.update();
        }
    }

    /// Detaches the binding behind `handle`.
    ///
    /// Returns `false` without doing anything if the binding is already gone
    /// or the handle came from another engine.
    pub fn remove_binding(&self, handle: &BindingHandle<T>) -> bool {
        if !handle.belongs_to(&self.downgrade()) {
            return false;
        }
        self.remove_entry(handle.priority(), handle.index(), RemovalCause::Disposed)
    }

    /// Re-applies coercion to the current raw value and republishes on change.
    ///
    /// Use this when state the coercion callback reads has changed.
    pub fn revalidate(&self) {
        self.update();
    }

    /// Returns the number of attached bindings across all levels.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.shared
            .borrow()
            .levels
            .iter()
            .map(|(_, level)| level.bindings().len())
            .sum()
    }

    /// Returns a snapshot of every binding, highest precedence first.
    #[must_use]
    pub fn bindings(&self) -> Vec<BindingDiagnostic<T>> {
        let shared = self.shared.borrow();
        shared
            .levels
            .iter()
            .flat_map(|(priority, level)| LevelDiagnostic::capture(*priority, level).bindings)
            .collect()
    }

    /// Returns a full snapshot of levels, bindings, and the effective value.
    #[must_use]
    pub fn diagnostic(&self) -> PropertyValueDiagnostic<T> {
        self.shared.borrow().diagnostic()
    }

    /// Returns the direct value remembered at `priority`, shadowed or not.
    #[must_use]
    pub fn direct_value(&self, priority: BindingPriority) -> Option<T> {
        self.shared
            .borrow()
            .level(priority)
            .and_then(|level| level.direct_value.clone())
    }

    pub(crate) fn has_entry(&self, priority: BindingPriority, index: BindingIndex) -> bool {
        self.shared
            .borrow()
            .level(priority)
            .is_some_and(|level| level.contains(index))
    }

    pub(crate) fn binding_next(
        &self,
        priority: BindingPriority,
        index: BindingIndex,
        value: Option<T>,
    ) {
        let (previous, shadowed) = {
            let mut shared = self.shared.borrow_mut();
            let Some(entry) = shared
                .level_mut(priority)
                .and_then(|level| level.entry_mut(index))
            else {
                return;
            };
            let previous = core::mem::replace(&mut entry.value, value);
            // A level below the effective one cannot change the outcome.
            (previous, priority > shared.priority)
        };
        drop(previous);
        if !shadowed {
            self.update();
        }
    }

    pub(crate) fn remove_entry(
        &self,
        priority: BindingPriority,
        index: BindingIndex,
        cause: RemovalCause,
    ) -> bool {
        let removed = self
            .shared
            .borrow_mut()
            .level_mut(priority)
            .and_then(|level| level.remove(index));
        let Some(entry) = removed else {
            return false;
        };

        #[cfg(feature = "tracing")]
        match &cause {
            RemovalCause::Failed(error) => tracing::warn!(
                message = "priority_value.binding_failed",
                property = self.property().name(),
                priority = priority.name(),
                index = index.get(),
                error = %error
            ),
            RemovalCause::Disposed | RemovalCause::Completed => tracing::debug!(
                message = "priority_value.binding_removed",
                property = self.property().name(),
                priority = priority.name(),
                index = index.get(),
                cause = ?cause
            ),
        }
        #[cfg(not(feature = "tracing"))]
        let _ = cause;

        // Releases the subscription, outside the borrow.
        drop(entry);
        self.update();
        true
    }

    /// Re-resolves and notifies the owner once per change.
    fn update(&self) {
        let mut shared = self.shared.borrow_mut();
        if shared.notifying {
            shared.pending = true;
            return;
        }
        loop {
            let (priority, value) = shared.resolve();
            shared.priority = priority;
            if value == shared.value {
                break;
            }
            let old_value = core::mem::replace(&mut shared.value, value.clone());

            #[cfg(feature = "tracing")]
            tracing::trace!(
                message = "priority_value.changed",
                property = shared.property.name(),
                priority = priority.name(),
                is_set = value.is_some()
            );

            let Some(owner) = shared.owner.clone() else {
                break;
            };
            let property = shared.property;
            shared.notifying = true;
            drop(shared);

            owner.changed(property, priority, old_value.as_ref(), value.as_ref());

            shared = self.shared.borrow_mut();
            shared.notifying = false;
            if !core::mem::take(&mut shared.pending) {
                break;
            }
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PriorityValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.try_borrow() {
            Ok(shared) => f
                .debug_struct("PriorityValue")
                .field("property", &shared.property)
                .field("value", &shared.value)
                .field("priority", &shared.priority)
                .field("levels", &shared.levels.len())
                .field("has_owner", &shared.owner.is_some())
                .field("has_coerce", &shared.coerce.is_some())
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("PriorityValue").finish_non_exhaustive(),
        }
    }
}
