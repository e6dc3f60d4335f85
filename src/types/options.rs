//! Per-call decide options.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A single option toggling one behavior of a decide call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecideOption {
    /// Do not hand an impression event to the dispatcher.
    DisableDecisionEvent,
    /// Drop disabled flags from batch results.
    EnabledFlagsOnly,
    /// Skip user profile lookup and save.
    IgnoreUserProfileService,
    /// Keep informational reasons in the decision.
    IncludeReasons,
    /// Leave `Decision::variables` empty.
    ExcludeVariables,
    /// Recompute even when a cached decision exists.
    IgnoreCache,
}

impl DecideOption {
    pub const ALL: [DecideOption; 6] = [
        DecideOption::DisableDecisionEvent,
        DecideOption::EnabledFlagsOnly,
        DecideOption::IgnoreUserProfileService,
        DecideOption::IncludeReasons,
        DecideOption::ExcludeVariables,
        DecideOption::IgnoreCache,
    ];

    const fn bit(self) -> u8 {
        match self {
            DecideOption::DisableDecisionEvent => 1 << 0,
            DecideOption::EnabledFlagsOnly => 1 << 1,
            DecideOption::IgnoreUserProfileService => 1 << 2,
            DecideOption::IncludeReasons => 1 << 3,
            DecideOption::ExcludeVariables => 1 << 4,
            DecideOption::IgnoreCache => 1 << 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecideOption::DisableDecisionEvent => "DISABLE_DECISION_EVENT",
            DecideOption::EnabledFlagsOnly => "ENABLED_FLAGS_ONLY",
            DecideOption::IgnoreUserProfileService => "IGNORE_USER_PROFILE_SERVICE",
            DecideOption::IncludeReasons => "INCLUDE_REASONS",
            DecideOption::ExcludeVariables => "EXCLUDE_VARIABLES",
            DecideOption::IgnoreCache => "IGNORE_CACHE",
        }
    }
}

impl fmt::Display for DecideOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`DecideOption`]s; composition is union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DecideOptions(u8);

impl DecideOptions {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn with(self, option: DecideOption) -> Self {
        Self(self.0 | option.bit())
    }

    pub const fn contains(&self, option: DecideOption) -> bool {
        self.0 & option.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: DecideOptions) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, option: DecideOption) {
        self.0 |= option.bit();
    }

    pub fn remove(&mut self, option: DecideOption) {
        self.0 &= !option.bit();
    }

    pub fn iter(&self) -> impl Iterator<Item = DecideOption> + '_ {
        DecideOption::ALL.into_iter().filter(|o| self.contains(*o))
    }

    /// The subset of options that changes the content of a decision.
    pub(crate) fn output_affecting(self) -> Self {
        let mut options = Self::empty();
        for option in [
            DecideOption::IncludeReasons,
            DecideOption::ExcludeVariables,
            DecideOption::IgnoreUserProfileService,
        ] {
            if self.contains(option) {
                options.insert(option);
            }
        }
        options
    }

    pub(crate) fn bits(&self) -> u8 {
        self.0
    }
}

impl From<DecideOption> for DecideOptions {
    fn from(option: DecideOption) -> Self {
        Self::empty().with(option)
    }
}

impl FromIterator<DecideOption> for DecideOptions {
    fn from_iter<I: IntoIterator<Item = DecideOption>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl<const N: usize> From<[DecideOption; N]> for DecideOptions {
    fn from(options: [DecideOption; N]) -> Self {
        options.into_iter().collect()
    }
}

impl BitOr for DecideOptions {
    type Output = DecideOptions;

    fn bitor(self, rhs: DecideOptions) -> DecideOptions {
        self.union(rhs)
    }
}

impl BitOr<DecideOption> for DecideOptions {
    type Output = DecideOptions;

    fn bitor(self, rhs: DecideOption) -> DecideOptions {
        self.with(rhs)
    }
}

impl BitOr for DecideOption {
    type Output = DecideOptions;

    fn bitor(self, rhs: DecideOption) -> DecideOptions {
        DecideOptions::from(self).with(rhs)
    }
}

impl BitOrAssign<DecideOption> for DecideOptions {
    fn bitor_assign(&mut self, rhs: DecideOption) {
        self.insert(rhs);
    }
}
