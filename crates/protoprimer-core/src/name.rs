//! The contract for closed state name enumerations.

use std::fmt;
use std::hash::Hash;

/// A closed enumeration of state names.
///
/// The derived `Ord` must agree with [`StateName::ordinal`]: declaration
/// order is the enumeration order used to validate parent lists.
pub trait StateName: Copy + Eq + Hash + Ord + fmt::Debug + 'static {
    /// Stable snake_case name, used on the command line and in renderings.
    fn as_str(&self) -> &'static str;

    /// Position of this name in the enumeration.
    fn ordinal(&self) -> usize;

    /// Every name, in enumeration order.
    fn all() -> &'static [Self];

    /// Looks a name up by its string form.
    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|n| n.as_str() == name)
    }
}
