// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding entries and the handles that reach them.
//!
//! A binding is one live source attached to a [`PriorityValue`] at some
//! [`BindingPriority`]. The engine keeps a private entry per binding holding
//! its latest value and its [`Subscription`]. Two handles point back at that
//! entry: the [`BindingObserver`] given to the source, and the
//! [`BindingHandle`] returned to whoever attached the binding. Both hold only
//! a weak reference to the engine and become inert once the entry is gone.

use alloc::rc::Weak;
use alloc::string::String;
use core::cell::RefCell;
use core::fmt;

use crate::error::SourceError;
use crate::priority::BindingPriority;
use crate::source::Subscription;
use crate::value::{PriorityValue, RemovalCause, Shared};

/// Identifies a binding within one engine.
///
/// Indices are handed out in attach order and never reused, so a later
/// binding always has a larger index than an earlier one.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingIndex(u64);

impl BindingIndex {
    pub(crate) const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-binding state owned by a priority level.
pub(crate) struct BindingEntry<T> {
    pub(crate) index: BindingIndex,
    pub(crate) description: String,
    /// Latest emission; `None` before the first one or after an unset.
    pub(crate) value: Option<T>,
    /// Filled in once `subscribe` returns. Dropping the entry releases it.
    pub(crate) subscription: Option<Subscription>,
}

impl<T> BindingEntry<T> {
    pub(crate) fn new(index: BindingIndex, description: String) -> Self {
        Self {
            index,
            description,
            value: None,
            subscription: None,
        }
    }
}

/// The sink a [`ValueSource`](crate::ValueSource) pushes into.
///
/// Every call re-resolves the owning engine before returning. Calls made
/// after the binding was removed, or after the engine was dropped, are
/// ignored.
pub struct BindingObserver<T> {
    target: Weak<RefCell<Shared<T>>>,
    priority: BindingPriority,
    index: BindingIndex,
}

impl<T: Clone + PartialEq + 'static> BindingObserver<T> {
    pub(crate) fn new(
        target: Weak<RefCell<Shared<T>>>,
        priority: BindingPriority,
        index: BindingIndex,
    ) -> Self {
        Self {
            target,
            priority,
            index,
        }
    }

    /// Records a new value for the binding; `None` is the unset sentinel.
    pub fn on_next(&self, value: Option<T>) {
        if let Some(engine) = self.engine() {
            engine.binding_next(self.priority, self.index, value);
        }
    }

    /// Ends the binding. It is removed and its subscription released.
    pub fn on_completed(&self) {
        if let Some(engine) = self.engine() {
            engine.remove_entry(self.priority, self.index, RemovalCause::Completed);
        }
    }

    /// Fails the binding. Handled exactly like [`on_completed`](Self::on_completed).
    pub fn on_error(&self, error: SourceError) {
        if let Some(engine) = self.engine() {
            engine.remove_entry(self.priority, self.index, RemovalCause::Failed(error));
        }
    }

    /// Returns `true` while the binding is still attached.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.engine()
            .is_some_and(|engine| engine.has_entry(self.priority, self.index))
    }

    /// The priority the binding was attached at.
    #[must_use]
    #[inline]
    pub fn priority(&self) -> BindingPriority {
        self.priority
    }

    /// The binding's index.
    #[must_use]
    #[inline]
    pub fn index(&self) -> BindingIndex {
        self.index
    }

    fn engine(&self) -> Option<PriorityValue<T>> {
        self.target.upgrade().map(PriorityValue::from_shared)
    }
}

impl<T> Clone for BindingObserver<T> {
    fn clone(&self) -> Self {
        Self {
            target: Weak::clone(&self.target),
            priority: self.priority,
            index: self.index,
        }
    }
}

impl<T> fmt::Debug for BindingObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingObserver")
            .field("priority", &self.priority)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Returned by [`PriorityValue::add_binding`]; disposing it detaches the binding.
///
/// Disposal is idempotent, and dropping the handle does *not* detach.
pub struct BindingHandle<T> {
    target: Weak<RefCell<Shared<T>>>,
    priority: BindingPriority,
    index: BindingIndex,
}

impl<T: Clone + PartialEq + 'static> BindingHandle<T> {
    pub(crate) fn new(
        target: Weak<RefCell<Shared<T>>>,
        priority: BindingPriority,
        index: BindingIndex,
    ) -> Self {
        Self {
            target,
            priority,
            index,
        }
    }

    /// Detaches the binding, releasing its subscription.
    ///
    /// Returns `true` if this call removed it, `false` if it was already gone.
    pub fn dispose(&self) -> bool {
        self.target.upgrade().is_some_and(|shared| {
            PriorityValue::from_shared(shared).remove_entry(
                self.priority,
                self.index,
                RemovalCause::Disposed,
            )
        })
    }

    /// Returns `true` while the binding is still attached.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.target.upgrade().is_some_and(|shared| {
            PriorityValue::from_shared(shared).has_entry(self.priority, self.index)
        })
    }

    /// The priority the binding was attached at.
    #[must_use]
    #[inline]
    pub fn priority(&self) -> BindingPriority {
        self.priority
    }

    /// The binding's index.
    #[must_use]
    #[inline]
    pub fn index(&self) -> BindingIndex {
        self.index
    }

    pub(crate) fn belongs_to(&self, target: &Weak<RefCell<Shared<T>>>) -> bool {
        Weak::ptr_eq(&self.target, target)
    }
}

impl<T> Clone for BindingHandle<T> {
    fn clone(&self) -> Self {
        Self {
            target: Weak::clone(&self.target),
            priority: self.priority,
            index: self.index,
        }
    }
}

impl<T> fmt::Debug for BindingHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingHandle")
            .field("priority", &self.priority)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
