//! Strongly typed identifiers.
//!
//! Every entity id in the system is an opaque 128-bit UUID. These newtypes
//! exist so a `SeatId` can never be passed where a `BookingId` is expected,
//! mirroring the strong-typed `StreamId`/`Version` pattern in
//! `composable_rust_core::stream`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Return the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(UserId);
uuid_id!(EventId);
uuid_id!(SectionId);
uuid_id!(SeatId);
uuid_id!(ReservationId);
uuid_id!(BookingId);
uuid_id!(PaymentId);
uuid_id!(WorkflowId);
uuid_id!(NotificationId);
uuid_id!(EventEnvelopeId);
uuid_id!(CorrelationId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_uuid() {
        let id = BookingId::new();
        let uuid: Uuid = id.into();
        assert_eq!(BookingId::from(uuid), id);
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if round-trip parsing fails
    fn ids_parse_from_str() {
        let id = SeatId::new();
        let parsed: SeatId = id.to_string().parse().expect("valid uuid string");
        assert_eq!(parsed, id);
    }

    #[test]
    fn distinct_ids_are_not_interchangeable_types() {
        // Compile-time guarantee: this test exists to document the invariant,
        // not to assert anything at runtime (a BookingId cannot be passed
        // where a SeatId is expected).
        let booking_id = BookingId::new();
        let seat_id = SeatId::new();
        assert_ne!(booking_id.as_uuid(), seat_id.as_uuid());
    }
}
