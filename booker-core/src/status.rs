//! The booking lifecycle state machine.
//!
//! ```text
//!   (none) ──create──► held ──confirm──► confirmed ──seat──► seated ──finish──► finished
//!                     │ │                    │                  │
//!                     │ │                    │                  └──no_show──► no_show
//!                     │ │                    └──cancel──► cancelled
//!                     │ └──cancel──► cancelled
//!                     └──(timer)──► expired
//! ```
//!
//! `finished`, `cancelled`, `no_show` and `expired` admit no outgoing edge.
//! Re-issuing a transition whose target equals the current status is treated
//! as an idempotent no-op by the coordinator, not here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Slot claimed, awaiting confirmation; carries an expiry deadline
    Held,
    /// Confirmed by an admin; the booking row defends the window
    Confirmed,
    /// Cancelled by an admin
    Cancelled,
    /// Guests arrived and were seated
    Seated,
    /// Guests left; the table is free again
    Finished,
    /// Guests never arrived
    NoShow,
    /// Hold lapsed without confirmation
    Expired,
}

impl BookingStatus {
    /// Stable textual form used in the database and on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Held => "held",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Seated => "seated",
            Self::Finished => "finished",
            Self::NoShow => "no_show",
            Self::Expired => "expired",
        }
    }

    /// Parse the database textual form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "held" => Some(Self::Held),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "seated" => Some(Self::Seated),
            "finished" => Some(Self::Finished),
            "no_show" => Some(Self::NoShow),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether the `self → to` edge exists in the automaton.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Held, Self::Confirmed)
                | (Self::Held, Self::Cancelled)
                | (Self::Held, Self::Expired)
                | (Self::Confirmed, Self::Seated)
                | (Self::Confirmed, Self::Cancelled)
                | (Self::Seated, Self::Finished)
                | (Self::Seated, Self::NoShow)
        )
    }

    /// Statuses with at least one edge into `to`. Used by the store's
    /// conditional update so a concurrent transition cannot slip between the
    /// coordinator's read and its write.
    #[must_use]
    pub fn valid_sources(to: Self) -> &'static [Self] {
        match to {
            Self::Confirmed | Self::Expired => &[Self::Held],
            Self::Cancelled => &[Self::Held, Self::Confirmed],
            Self::Seated => &[Self::Confirmed],
            Self::Finished | Self::NoShow => &[Self::Seated],
            Self::Held => &[],
        }
    }

    /// Whether no outgoing edge exists.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Finished | Self::NoShow | Self::Expired
        )
    }

    /// Whether a booking in this status counts toward slot occupancy.
    #[must_use]
    pub const fn occupies(self) -> bool {
        matches!(self, Self::Held | Self::Confirmed | Self::Seated)
    }

    /// Whether the expiry deadline must be cleared when entering this status.
    ///
    /// Only `held` carries a meaningful deadline.
    #[must_use]
    pub const fn clears_expiry(self) -> bool {
        !matches!(self, Self::Held)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 7] = [
        BookingStatus::Held,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Seated,
        BookingStatus::Finished,
        BookingStatus::NoShow,
        BookingStatus::Expired,
    ];

    #[test]
    fn held_edges() {
        assert!(BookingStatus::Held.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Held.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Held.can_transition_to(BookingStatus::Expired));
        assert!(!BookingStatus::Held.can_transition_to(BookingStatus::Seated));
        assert!(!BookingStatus::Held.can_transition_to(BookingStatus::Finished));
    }

    #[test]
    fn confirmed_edges() {
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Seated));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Confirmed.can_transition_to(BookingStatus::Expired));
        assert!(!BookingStatus::Confirmed.can_transition_to(BookingStatus::NoShow));
    }

    #[test]
    fn seated_edges() {
        assert!(BookingStatus::Seated.can_transition_to(BookingStatus::Finished));
        assert!(BookingStatus::Seated.can_transition_to(BookingStatus::NoShow));
        assert!(!BookingStatus::Seated.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in ALL {
            if from.is_terminal() {
                for to in ALL {
                    assert!(
                        !from.can_transition_to(to),
                        "{from} must not transition to {to}"
                    );
                }
            }
        }
    }

    #[test]
    fn valid_sources_agrees_with_edges() {
        for from in ALL {
            for to in ALL {
                let listed = BookingStatus::valid_sources(to).contains(&from);
                assert_eq!(
                    listed,
                    from.can_transition_to(to),
                    "edge table mismatch for {from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn occupancy_set() {
        let occupying: Vec<_> = ALL.into_iter().filter(|s| s.occupies()).collect();
        assert_eq!(
            occupying,
            vec![
                BookingStatus::Held,
                BookingStatus::Confirmed,
                BookingStatus::Seated
            ]
        );
    }

    #[test]
    fn textual_round_trip() {
        for status in ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("held "), None);
    }
}
