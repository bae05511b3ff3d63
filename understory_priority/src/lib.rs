// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Priority: layered value resolution for live-bound properties.
//!
//! A property on a UI object can receive values from many places at once: an
//! animation, a local assignment, a style trigger, a template, a style. Each
//! arrives at a [`BindingPriority`], either as a direct value or from a live
//! [`ValueSource`] that keeps emitting over time. [`PriorityValue`] keeps all
//! of them and maintains the single effective value, notifying an owner
//! whenever it changes.
//!
//! ## Core Concepts
//!
//! ### Priorities
//!
//! Smaller [`BindingPriority`] values win:
//!
//! - **Animation** - running animations, above everything else
//! - **`LocalValue`** - values assigned directly on the object
//! - **`StyleTrigger`** - conditional style setters
//! - **`TemplatedParent`** - values forwarded from a template
//! - **Style** - plain style setters
//! - **Unset** - the "no value" priority
//!
//! ### Levels
//!
//! Every priority in use has a level holding a direct value plus any number
//! of bindings. The most recently attached binding that currently holds a
//! value supplies the level; the direct value shows only when none does. The
//! effective value comes from the highest precedence level offering one, and
//! is passed through an optional coercion callback.
//!
//! ### Sources and Bindings
//!
//! A [`ValueSource`] is subscribed with a [`BindingObserver`] and returns a
//! [`Subscription`]. Emitting `None` unsets the binding, and completing or
//! failing removes it. Built-in sources are [`Subject`], [`Just`], and
//! [`from_fn`]. [`PriorityValue::add_binding`] returns a [`BindingHandle`]
//! whose [`dispose`](BindingHandle::dispose) detaches the binding.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use understory_priority::{
//!     BindingPriority, Property, PropertyId, PriorityValue, Subject,
//! };
//!
//! const WIDTH: Property<f64> = Property::new(PropertyId::new(0), "Width");
//!
//! let changes = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&changes);
//! let width = PriorityValue::new(WIDTH)
//!     .with_coerce(|w: f64| w.max(0.0))
//!     .with_owner(
//!         move |_: Property<f64>,
//!               _: BindingPriority,
//!               _: Option<&f64>,
//!               new: Option<&f64>| {
//!             sink.borrow_mut().push(new.copied());
//!         },
//!     );
//!
//! // A style binding supplies a value.
//! let style = Subject::with_value(120.0);
//! width.add_binding(style.clone(), BindingPriority::Style);
//! assert_eq!(width.value(), Some(120.0));
//!
//! // A local value outranks the style.
//! width.set_value(-5.0, BindingPriority::LocalValue);
//! assert_eq!(width.value(), Some(0.0));
//!
//! // Clearing it reveals the style again, which has kept updating.
//! style.next(80.0);
//! width.clear_value(BindingPriority::LocalValue);
//! assert_eq!(width.value(), Some(80.0));
//!
//! assert_eq!(*changes.borrow(), [Some(120.0), Some(0.0), Some(80.0)]);
//! ```
//!
//! ## Storage
//!
//! [`PriorityStore`] keeps the engines of one object in a sparse sorted
//! vector keyed by [`PropertyId`], so only properties that were actually
//! touched cost anything.
//!
//! ## Diagnostics
//!
//! [`PriorityValue::diagnostic`] returns a [`PropertyValueDiagnostic`]: a
//! plain snapshot of every level and binding, for inspectors and tests.
//!
//! ## Features
//!
//! - `tracing`: emit `tracing` events when bindings attach, detach, or fail,
//!   and when the effective value changes.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`. It does not depend on `std`.

#![no_std]

extern crate alloc;

mod binding;
mod diagnostics;
mod error;
mod level;
mod priority;
mod property;
mod source;
mod store;
mod value;

pub use binding::{BindingHandle, BindingIndex, BindingObserver};
pub use diagnostics::{BindingDiagnostic, LevelDiagnostic, PropertyValueDiagnostic};
pub use error::SourceError;
pub use priority::BindingPriority;
pub use property::{Property, PropertyId};
pub use source::{FromFn, Just, Subject, Subscription, ValueSource, from_fn};
pub use store::{PriorityStore, PropertySummary};
pub use value::{CoerceValueCallback, PriorityValue, PriorityValueOwner};
