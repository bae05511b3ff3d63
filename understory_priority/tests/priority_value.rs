// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests for the `understory_priority` crate.
//!
//! These exercise `PriorityValue` through its public API: precedence between
//! priorities, recency within a priority, fallback when bindings unset or
//! complete, coercion, and owner notification.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use understory_priority::{
    BindingIndex, BindingObserver, BindingPriority, Just, PriorityValue, Property, PropertyId,
    SourceError, Subject, Subscription, from_fn,
};

const TEXT: Property<&'static str> = Property::new(PropertyId::new(0), "Text");
const COUNT: Property<i32> = Property::new(PropertyId::new(1), "Count");

type Changes<T> = Rc<RefCell<Vec<(BindingPriority, Option<T>, Option<T>)>>>;

fn observed<T: Clone + PartialEq + 'static>(
    property: Property<T>,
) -> (PriorityValue<T>, Changes<T>) {
    let changes: Changes<T> = Rc::default();
    let sink = Rc::clone(&changes);
    let value = PriorityValue::new(property).with_owner(
        move |_: Property<T>, priority: BindingPriority, old: Option<&T>, new: Option<&T>| {
            sink.borrow_mut().push((priority, old.cloned(), new.cloned()));
        },
    );
    (value, changes)
}

#[test]
fn initial_value_is_unset() {
    let value = PriorityValue::new(TEXT);
    assert_eq!(value.value(), None);
    assert_eq!(value.priority(), BindingPriority::Unset);
    assert!(!value.is_set());
    assert_eq!(value.binding_count(), 0);
    assert!(value.diagnostic().levels.is_empty());
}

#[test]
fn higher_priority_wins_regardless_of_order() {
    let value = PriorityValue::new(TEXT);
    value.add_binding(Just::new("local"), BindingPriority::LocalValue);
    value.add_binding(Just::new("style"), BindingPriority::Style);
    assert_eq!(value.value(), Some("local"));

    let value = PriorityValue::new(TEXT);
    value.add_binding(Just::new("style"), BindingPriority::Style);
    value.add_binding(Just::new("local"), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("local"));
    assert_eq!(value.priority(), BindingPriority::LocalValue);
}

#[test]
fn animation_outranks_everything() {
    let value = PriorityValue::new(COUNT);
    for (n, priority) in (0..).zip(BindingPriority::ALL.into_iter().rev()) {
        value.set_value(n, priority);
    }
    assert_eq!(value.priority(), BindingPriority::Animation);
    assert_eq!(value.value(), Some(5));
}

#[test]
fn newer_binding_wins_within_a_priority() {
    let older = Subject::with_value("older");
    let newer = Subject::with_value("newer");
    let value = PriorityValue::new(TEXT);
    value.add_binding(older.clone(), BindingPriority::Style);
    value.add_binding(newer.clone(), BindingPriority::Style);
    assert_eq!(value.value(), Some("newer"));

    older.next("older again");
    assert_eq!(value.value(), Some("newer"));

    newer.next("newer again");
    assert_eq!(value.value(), Some("newer again"));
}

#[test]
fn binding_overrides_earlier_direct_value() {
    let value = PriorityValue::new(TEXT);
    value.set_value("direct", BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("direct"));

    value.add_binding(Just::new("bound"), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("bound"));
    assert_eq!(value.direct_value(BindingPriority::LocalValue), Some("direct"));
}

#[test]
fn unset_emission_falls_back_in_order() {
    let older = Subject::with_value("older");
    let newer = Subject::with_value("newer");
    let value = PriorityValue::new(TEXT);
    value.add_binding(Just::new("style"), BindingPriority::Style);
    value.set_value("direct", BindingPriority::LocalValue);
    value.add_binding(older.clone(), BindingPriority::LocalValue);
    value.add_binding(newer.clone(), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("newer"));

    // Next most recent binding at the same priority.
    newer.unset();
    assert_eq!(value.value(), Some("older"));

    // Then the direct value.
    older.unset();
    assert_eq!(value.value(), Some("direct"));

    // Then the next lower priority.
    value.clear_value(BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("style"));
    assert_eq!(value.priority(), BindingPriority::Style);

    // A binding that comes back takes over again.
    older.next("older is back");
    assert_eq!(value.value(), Some("older is back"));
}

#[test]
fn completion_reverts_to_next_candidate() {
    let only = Subject::with_value(3);
    let value = PriorityValue::new(COUNT);
    let handle = value.add_binding(only.clone(), BindingPriority::TemplatedParent);
    assert_eq!(value.value(), Some(3));

    only.complete();
    assert_eq!(value.value(), None);
    assert_eq!(value.priority(), BindingPriority::Unset);
    assert!(!handle.is_alive());
    assert_eq!(value.binding_count(), 0);
    assert_eq!(only.observer_count(), 0);
}

#[test]
fn source_error_is_contained() {
    let failing = Subject::with_value(1);
    let steady = Subject::with_value(2);
    let value = PriorityValue::new(COUNT);
    value.add_binding(steady.clone(), BindingPriority::Style);
    value.add_binding(failing.clone(), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some(1));

    failing.error(SourceError::new("connection lost"));
    assert_eq!(value.value(), Some(2));
    assert_eq!(value.binding_count(), 1);

    // Other bindings keep working.
    steady.next(5);
    assert_eq!(value.value(), Some(5));
}

#[test]
fn revalidate_reapplies_coercion() {
    let max = Rc::new(Cell::new(10));
    let bound = Rc::clone(&max);
    let value = PriorityValue::new(COUNT).with_coerce(move |n: i32| n.min(bound.get()));

    value.set_value(15, BindingPriority::LocalValue);
    assert_eq!(value.value(), Some(10));

    max.set(12);
    assert_eq!(value.value(), Some(10));
    value.revalidate();
    assert_eq!(value.value(), Some(12));

    // Coercion applies to bound values as well.
    let source = Subject::with_value(40);
    value.add_binding(source.clone(), BindingPriority::Animation);
    assert_eq!(value.value(), Some(12));
    source.next(-1);
    assert_eq!(value.value(), Some(-1));
}

#[test]
fn exactly_one_notification_per_change() {
    let (value, changes) = observed(COUNT);
    let subject = Subject::with_value(1);

    let handle = value.add_binding(subject.clone(), BindingPriority::Style);
    subject.next(1);
    subject.next(2);
    value.set_value(2, BindingPriority::LocalValue);
    value.set_value(3, BindingPriority::LocalValue);
    value.clear_value(BindingPriority::LocalValue);
    value.clear_value(BindingPriority::LocalValue);
    handle.dispose();
    handle.dispose();

    assert_eq!(
        *changes.borrow(),
        vec![
            (BindingPriority::Style, None, Some(1)),
            (BindingPriority::Style, Some(1), Some(2)),
            (BindingPriority::LocalValue, Some(2), Some(3)),
            (BindingPriority::Style, Some(3), Some(2)),
            (BindingPriority::Unset, Some(2), None),
        ]
    );
}

#[test]
fn owner_sees_updated_value() {
    let value = Rc::new(RefCell::new(None::<PriorityValue<i32>>));
    let reads = Rc::new(RefCell::new(Vec::new()));
    let engine = {
        let value = Rc::clone(&value);
        let reads = Rc::clone(&reads);
        PriorityValue::new(COUNT).with_owner(
            move |_: Property<i32>, _: BindingPriority, _: Option<&i32>, _: Option<&i32>| {
                if let Some(engine) = value.borrow().as_ref() {
                    reads.borrow_mut().push(engine.value());
                }
            },
        )
    };
    *value.borrow_mut() = Some(engine);

    let guard = value.borrow();
    let engine = guard.as_ref().unwrap();
    engine.set_value(4, BindingPriority::Style);
    engine.set_value(9, BindingPriority::LocalValue);
    assert_eq!(*reads.borrow(), vec![Some(4), Some(9)]);
}

#[test]
fn scenario_recency_then_completion() {
    let foo = Subject::with_value("foo");
    let bar = Subject::with_value("bar");
    let value = PriorityValue::new(TEXT);

    value.add_binding(foo.clone(), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("foo"));

    value.add_binding(bar.clone(), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("bar"));

    bar.complete();
    assert_eq!(value.value(), Some("foo"));
}

#[test]
fn scenario_local_value_beats_style_triggers() {
    let value = PriorityValue::new(TEXT);
    value.add_binding(Just::new("foo"), BindingPriority::StyleTrigger);
    value.add_binding(Just::new("bar"), BindingPriority::LocalValue);
    value.add_binding(Just::new("baz"), BindingPriority::StyleTrigger);
    assert_eq!(value.value(), Some("bar"));
}

#[test]
fn scenario_coercion_bound_changes() {
    let max = Rc::new(Cell::new(10));
    let bound = Rc::clone(&max);
    let value = PriorityValue::new(COUNT).with_coerce(move |n: i32| n.min(bound.get()));

    value.set_value(15, BindingPriority::LocalValue);
    assert_eq!(value.value(), Some(10));

    max.set(12);
    value.revalidate();
    assert_eq!(value.value(), Some(12));
}

#[test]
fn scenario_direct_value_waits_for_binding() {
    let (value, changes) = observed(TEXT);
    let source = Subject::with_value("initial");
    value.add_binding(source.clone(), BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("initial"));

    value.set_value("first", BindingPriority::LocalValue);
    assert_eq!(value.value(), Some("initial"));

    source.unset();
    assert_eq!(value.value(), Some("first"));
    assert_eq!(
        *changes.borrow(),
        vec![
            (BindingPriority::LocalValue, None, Some("initial")),
            (BindingPriority::LocalValue, Some("initial"), Some("first")),
        ]
    );
}

#[test]
fn direct_value_shows_when_binding_completes() {
    let source = Subject::with_value("initial");
    let value = PriorityValue::new(TEXT);
    value.add_binding(source.clone(), BindingPriority::LocalValue);
    value.set_value("first", BindingPriority::LocalValue);

    source.complete();
    assert_eq!(value.value(), Some("first"));
}

#[test]
fn dispose_releases_subscription_once() {
    let released = Rc::new(Cell::new(0));
    let counter = Rc::clone(&released);
    let value = PriorityValue::new(COUNT);
    let handle = value.add_binding(
        from_fn(move |observer: BindingObserver<i32>| {
            observer.on_next(Some(1));
            Subscription::new(move || counter.set(counter.get() + 1))
        })
        .with_description("counter"),
        BindingPriority::LocalValue,
    );
    assert_eq!(value.value(), Some(1));
    assert_eq!(released.get(), 0);

    assert!(handle.dispose());
    assert_eq!(released.get(), 1);
    assert!(!handle.dispose());
    assert!(!value.remove_binding(&handle));
    assert_eq!(released.get(), 1);
    assert_eq!(value.value(), None);
}

#[test]
fn source_error_releases_subscription_once() {
    let released = Rc::new(Cell::new(0));
    let counter = Rc::clone(&released);
    let stash = Rc::new(RefCell::new(None::<BindingObserver<i32>>));
    let keep = Rc::clone(&stash);
    let value = PriorityValue::new(COUNT);
    let handle = value.add_binding(
        from_fn(move |observer: BindingObserver<i32>| {
            observer.on_next(Some(1));
            *keep.borrow_mut() = Some(observer);
            Subscription::new(move || counter.set(counter.get() + 1))
        }),
        BindingPriority::LocalValue,
    );
    assert_eq!(value.value(), Some(1));

    let observer = stash.borrow_mut().take().unwrap();
    observer.on_error(SourceError::new("first failure"));
    observer.on_error(SourceError::new("second failure"));
    assert!(!handle.dispose());

    assert_eq!(released.get(), 1);
    assert_eq!(value.value(), None);
    assert!(!handle.is_alive());
    assert_eq!(value.binding_count(), 0);
}

#[test]
fn late_observer_calls_are_ignored() {
    let stash = Rc::new(RefCell::new(None::<BindingObserver<i32>>));
    let keep = Rc::clone(&stash);
    let value = PriorityValue::new(COUNT);
    let handle = value.add_binding(
        from_fn(move |observer: BindingObserver<i32>| {
            observer.on_next(Some(5));
            *keep.borrow_mut() = Some(observer);
            Subscription::empty()
        }),
        BindingPriority::Style,
    );
    handle.dispose();

    let observer = stash.borrow_mut().take().unwrap();
    assert!(!observer.is_alive());
    observer.on_next(Some(6));
    observer.on_error(SourceError::new("too late"));
    assert_eq!(value.value(), None);

    // After the engine is gone as well.
    drop(value);
    observer.on_next(Some(7));
}

#[test]
fn diagnostics_describe_levels_and_bindings() {
    let value = PriorityValue::new(TEXT);
    value.set_value("direct", BindingPriority::LocalValue);
    let first = value.add_binding(
        from_fn(|observer: BindingObserver<&'static str>| {
            observer.on_next(Some("first"));
            Subscription::empty()
        })
        .with_description("first source"),
        BindingPriority::LocalValue,
    );
    let second = value.add_binding(Just::unset(), BindingPriority::LocalValue);
    value.add_binding(Just::new("style"), BindingPriority::Style);

    let diagnostic = value.diagnostic();
    assert_eq!(diagnostic.property, TEXT);
    assert_eq!(diagnostic.value, Some("first"));
    assert_eq!(diagnostic.priority, BindingPriority::LocalValue);
    assert_eq!(diagnostic.levels.len(), 2);

    let local = diagnostic.level(BindingPriority::LocalValue).unwrap();
    assert_eq!(local.direct_value, Some("direct"));
    assert_eq!(local.active_binding_index, Some(first.index()));
    assert_eq!(local.bindings.len(), 2);
    assert_eq!(local.bindings[0].description, "first source");
    assert!(local.bindings[0].is_active);
    assert_eq!(local.bindings[1].index, second.index());
    assert_eq!(local.bindings[1].value, None);
    assert!(!local.bindings[1].is_active);

    let effective = diagnostic.effective_binding().unwrap();
    assert_eq!(effective.index, first.index());

    let all = value.bindings();
    assert_eq!(all.len(), 3);
    assert_eq!(all[2].priority, BindingPriority::Style);
    assert!(all[2].is_active);
    assert!(all.iter().map(|b| b.index).is_sorted_by_key(BindingIndex::get));
}

#[test]
fn handles_report_their_binding() {
    let value = PriorityValue::new(COUNT);
    let a = value.add_binding(Just::new(1), BindingPriority::Style);
    let b = a.clone();
    assert_eq!(a.priority(), BindingPriority::Style);
    assert_eq!(a.index(), b.index());
    assert!(b.dispose());
    assert!(!a.is_alive());
    assert!(format!("{a:?}").contains("BindingHandle"));
}

#[test]
fn unset_priority_is_the_lowest_level() {
    let value = PriorityValue::new(COUNT);
    value.set_value(1, BindingPriority::Unset);
    assert_eq!(value.value(), Some(1));
    assert_eq!(value.priority(), BindingPriority::Unset);

    value.set_value(2, BindingPriority::Style);
    assert_eq!(value.value(), Some(2));
}

#[test]
fn subject_subscribed_after_completion_is_inert() {
    let subject = Subject::with_value(1);
    subject.complete();
    let value = PriorityValue::new(COUNT);
    let handle = value.add_binding(subject.clone(), BindingPriority::LocalValue);
    assert!(!handle.is_alive());
    assert_eq!(value.value(), None);
    assert_eq!(value.binding_count(), 0);
}
