// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Live value sources.
//!
//! A [`ValueSource`] is anything that can push values into a binding: a
//! multicast [`Subject`], a one-shot [`Just`], or an adapter over a channel or
//! poller written with [`from_fn`]. Sources talk to the engine only through
//! the [`BindingObserver`] they are handed on subscription, and hand back a
//! [`Subscription`] that the engine releases when the binding goes away.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::cell::RefCell;
use core::fmt;
use smallvec::SmallVec;

use crate::binding::BindingObserver;
use crate::error::SourceError;

/// A push-based source of values for one binding.
///
/// `subscribe` may emit synchronously before returning (a source that already
/// has a current value usually does). Emitting `None` means "no opinion right
/// now" and lets lower-ranked candidates show through.
pub trait ValueSource<T> {
    /// Connects `observer` to this source.
    ///
    /// The returned [`Subscription`] is owned by the binding and released
    /// exactly once when the binding is disposed, completes, or fails.
    fn subscribe(self, observer: BindingObserver<T>) -> Subscription;

    /// A human readable description, shown in diagnostics.
    fn description(&self) -> String {
        String::from(core::any::type_name::<Self>())
    }
}

/// The live connection between a source and a binding.
///
/// Releasing runs the source-provided cleanup exactly once, either through
/// [`Subscription::unsubscribe`] or when the subscription is dropped.
#[must_use = "dropping a `Subscription` releases it immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Creates a subscription that runs `release` when released.
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Creates a subscription with nothing to release.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Returns `true` if releasing this subscription still has work to do.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Releases the subscription now.
    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// A source that emits a single value on subscription and never completes.
///
/// ```rust
/// use understory_priority::{BindingPriority, Just, Property, PropertyId, PriorityValue};
///
/// const TEXT: Property<&str> = Property::new(PropertyId::new(0), "Text");
///
/// let value = PriorityValue::new(TEXT);
/// value.add_binding(Just::new("foo"), BindingPriority::LocalValue);
/// assert_eq!(value.value(), Some("foo"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Just<T>(Option<T>);

impl<T> Just<T> {
    /// Creates a source emitting `value`.
    pub fn new(value: T) -> Self {
        Self(Some(value))
    }

    /// Creates a source emitting the unset sentinel.
    pub fn unset() -> Self {
        Self(None)
    }
}

impl<T: Clone + PartialEq + 'static> ValueSource<T> for Just<T> {
    fn subscribe(self, observer: BindingObserver<T>) -> Subscription {
        observer.on_next(self.0);
        Subscription::empty()
    }
}

/// A source built from a closure; see [`from_fn`].
pub struct FromFn<F> {
    subscribe: F,
    description: Option<String>,
}

impl<F> FromFn<F> {
    /// Overrides the description shown in diagnostics.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<F> fmt::Debug for FromFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FromFn")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<T, F> ValueSource<T> for FromFn<F>
where
    F: FnOnce(BindingObserver<T>) -> Subscription,
{
    fn subscribe(self, observer: BindingObserver<T>) -> Subscription {
        (self.subscribe)(observer)
    }

    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| String::from("FromFn"))
    }
}

/// Builds a source from a subscribe closure.
///
/// The closure receives the observer and returns the subscription to release
/// later. This is the adapter for channels, pollers, and other push sources.
///
/// ```rust
/// use understory_priority::{
///     BindingPriority, Property, PropertyId, PriorityValue, Subscription, from_fn,
/// };
///
/// const COUNT: Property<i32> = Property::new(PropertyId::new(0), "Count");
///
/// let value = PriorityValue::new(COUNT);
/// value.add_binding(
///     from_fn(|observer| {
///         observer.on_next(Some(3));
///         Subscription::empty()
///     }),
///     BindingPriority::Style,
/// );
/// assert_eq!(value.value(), Some(3));
/// ```
pub fn from_fn<T, F>(subscribe: F) -> FromFn<F>
where
    F: FnOnce(BindingObserver<T>) -> Subscription,
{
    FromFn {
        subscribe,
        description: None,
    }
}

#[derive(Clone, Debug)]
enum Termination {
    Completed,
    Failed(SourceError),
}

struct SubjectState<T> {
    replay: bool,
    latest: Option<Option<T>>,
    observers: SmallVec<[(u64, BindingObserver<T>); 2]>,
    next_id: u64,
    terminated: Option<Termination>,
    /// Set while an emission is being delivered.
    emitting: bool,
    /// Emissions made during a delivery, delivered in order once it finishes.
    pending: VecDeque<Option<T>>,
}

/// A multicast source driven by hand.
///
/// Every subscribed binding sees each emission. A subject created with
/// [`Subject::with_value`] also replays its latest emission to new
/// subscribers, so a binding attached to it has a value immediately.
///
/// Cloning a subject yields another handle to the same stream.
///
/// Subscribers see emissions in the order they were made, even when a
/// subscriber emits again from inside a delivery: the nested emission is
/// queued and delivered to everyone after the current one.
///
/// ```rust
/// use understory_priority::{BindingPriority, Property, PropertyId, PriorityValue, Subject};
///
/// const TEXT: Property<&str> = Property::new(PropertyId::new(0), "Text");
///
/// let subject = Subject::with_value("foo");
/// let value = PriorityValue::new(TEXT);
/// value.add_binding(subject.clone(), BindingPriority::LocalValue);
/// assert_eq!(value.value(), Some("foo"));
///
/// subject.next("bar");
/// assert_eq!(value.value(), Some("bar"));
///
/// subject.complete();
/// assert_eq!(value.value(), None);
/// ```
pub struct Subject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T: Clone + PartialEq + 'static> Subject<T> {
    /// Creates a subject with no current value that does not replay.
    #[must_use]
    pub fn new() -> Self {
        Self::from_state(false, None)
    }

    /// Creates a subject that replays its latest emission, starting with `value`.
    #[must_use]
    pub fn with_value(value: T) -> Self {
        Self::from_state(true, Some(Some(value)))
    }

    fn from_state(replay: bool, latest: Option<Option<T>>) -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                replay,
                latest,
                observers: SmallVec::new(),
                next_id: 0,
                terminated: None,
                emitting: false,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Emits `value` to every subscriber.
    pub fn next(&self, value: T) {
        self.emit(Some(value));
    }

    /// Emits the unset sentinel to every subscriber.
    pub fn unset(&self) {
        self.emit(None);
    }

    /// Emits `value`, where `None` is the unset sentinel.
    ///
    /// Ignored once the subject has completed or failed.
    pub fn emit(&self, value: Option<T>) {
        {
            let mut state = self.state.borrow_mut();
            if state.terminated.is_some() {
                return;
            }
            state.pending.push_back(value);
            if state.emitting {
                return;
            }
            state.emitting = true;
        }
        loop {
            let (observers, value) = {
                let mut state = self.state.borrow_mut();
                let next = match state.terminated {
                    Some(_) => None,
                    None => state.pending.pop_front(),
                };
                let Some(value) = next else {
                    state.pending.clear();
                    state.emitting = false;
                    return;
                };
                if state.replay {
                    state.latest = Some(value.clone());
                }
                (state.observers.clone(), value)
            };
            for (_, observer) in observers {
                observer.on_next(value.clone());
            }
        }
    }

    /// Completes the stream; every subscribed binding is removed.
    pub fn complete(&self) {
        self.terminate(Termination::Completed);
    }

    /// Fails the stream; every subscribed binding is removed.
    pub fn error(&self, error: SourceError) {
        self.terminate(Termination::Failed(error));
    }

    fn terminate(&self, termination: Termination) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.terminated.is_some() {
                return;
            }
            state.terminated = Some(termination.clone());
            state.latest = None;
            core::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            deliver_termination(&observer, &termination);
        }
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Returns `true` once [`complete`](Self::complete) or [`error`](Self::error) was called.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state.borrow().terminated.is_some()
    }
}

fn deliver_termination<T: Clone + PartialEq + 'static>(
    observer: &BindingObserver<T>,
    termination: &Termination,
) {
    match termination {
        Termination::Completed => observer.on_completed(),
        Termination::Failed(error) => observer.on_error(error.clone()),
    }
}

impl<T: Clone + PartialEq + 'static> ValueSource<T> for Subject<T> {
    fn subscribe(self, observer: BindingObserver<T>) -> Subscription {
        let (id, replay) = {
            let mut state = self.state.borrow_mut();
            let terminated = state.terminated.clone();
            if let Some(termination) = terminated {
                drop(state);
                deliver_termination(&observer, &termination);
                return Subscription::empty();
            }
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, observer.clone()));
            (id, state.latest.clone())
        };

        if let Some(value) = replay {
            observer.on_next(value);
        }

        let state: Weak<RefCell<SubjectState<T>>> = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state
                    .borrow_mut()
                    .observers
                    .retain(|(observer_id, _)| *observer_id != id);
            }
        })
    }

    fn description(&self) -> String {
        String::from("Subject")
    }
}

impl<T: Clone + PartialEq + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Subject")
                .field("replay", &state.replay)
                .field("observers", &state.observers.len())
                .field("terminated", &state.terminated.is_some())
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("Subject").finish_non_exhaustive(),
        }
    }
}
