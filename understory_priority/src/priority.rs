// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Binding priorities.

use core::fmt;

/// The rank a value source is attached at.
///
/// Lower ranks win: an [`Animation`](Self::Animation) value shadows a
/// [`LocalValue`](Self::LocalValue), which shadows every style-derived rank.
/// The ordering derived from the discriminants is the precedence order, so
/// `a < b` reads as "`a` takes precedence over `b`".
///
/// ```rust
/// use understory_priority::BindingPriority;
///
/// assert!(BindingPriority::LocalValue < BindingPriority::StyleTrigger);
/// assert!(BindingPriority::Animation < BindingPriority::LocalValue);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i8)]
pub enum BindingPriority {
    /// Values produced by running animations.
    Animation = -1,
    /// Values set or bound directly on the object.
    LocalValue = 0,
    /// Values from style triggers (conditional setters).
    StyleTrigger = 1,
    /// Values bound through a templated parent.
    TemplatedParent = 2,
    /// Values from plain style setters.
    Style = 3,
    /// No source provides a value.
    ///
    /// Reported as the effective priority of an unset property. Sources may
    /// still be attached here; they lose against every other rank.
    Unset = i8::MAX,
}

impl BindingPriority {
    /// All priorities in precedence order.
    pub const ALL: [Self; 6] = [
        Self::Animation,
        Self::LocalValue,
        Self::StyleTrigger,
        Self::TemplatedParent,
        Self::Style,
        Self::Unset,
    ];

    /// Returns the numeric rank.
    #[must_use]
    #[inline]
    pub const fn rank(self) -> i8 {
        self as i8
    }

    /// Returns `true` for [`Unset`](Self::Unset).
    #[must_use]
    #[inline]
    pub const fn is_unset(self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns the variant name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Animation => "Animation",
            Self::LocalValue => "LocalValue",
            Self::StyleTrigger => "StyleTrigger",
            Self::TemplatedParent => "TemplatedParent",
            Self::Style => "Style",
            Self::Unset => "Unset",
        }
    }
}

impl fmt::Display for BindingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
