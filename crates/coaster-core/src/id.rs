//! Strongly-typed identifiers.

use std::fmt;

/// Identifies a passenger for the lifetime of a simulation.
///
/// Passengers are numbered from 1 in spawn order, which is also the order
/// in which they join the boarding queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassengerId(pub u32);

impl fmt::Display for PassengerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PassengerId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// 1-based ride number.
///
/// `RideId(n)` is the n-th run of the car. The ride being boarded while
/// `rides_completed == k` is `RideId(k + 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RideId(pub u32);

impl RideId {
    /// The ride that follows `completed` finished rides.
    pub fn next_after(completed: u32) -> Self {
        Self(completed.saturating_add(1))
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for RideId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_numbers_are_one_based() {
        assert_eq!(RideId::next_after(0), RideId(1));
        assert_eq!(RideId::next_after(3), RideId(4));
        assert_eq!(RideId::next_after(u32::MAX), RideId(u32::MAX));
    }

    #[test]
    fn ids_display_as_plain_numbers() {
        assert_eq!(PassengerId(7).to_string(), "7");
        assert_eq!(RideId::from(2).to_string(), "2");
    }
}
