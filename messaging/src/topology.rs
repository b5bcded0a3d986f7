//! Exchange and queue topology: which exchanges exist, and which routing
//! keys each service's queue binds to.
//!
//! Grounded in the original `rabbitmq_client.py`'s `_setup_bindings` table,
//! carried forward verbatim rather than the looser "binds `<domain>.*`"
//! description in the distilled spec.

/// The four durable topic exchanges, one per domain.
pub const EXCHANGES: [&str; 4] = [
    "user.events",
    "event.events",
    "booking.events",
    "payment.events",
];

/// A single `(exchange, routing_key_pattern)` binding.
pub type Binding = (&'static str, &'static str);

/// The routing keys a given service's durable queue binds to, across
/// whichever exchanges it consumes from.
///
/// Returns an empty slice for a service name outside the fixed binding
/// table (an unrecognized `service_name` is a configuration error the
/// caller should surface, not silently bind to nothing and proceed).
#[must_use]
pub fn bindings_for(service_name: &str) -> &'static [Binding] {
    match service_name {
        "user-service" => &[("booking.events", "booking.*"), ("payment.events", "payment.*")],
        "event-service" => &[
            ("user.events", "user.*"),
            ("booking.events", "booking.*"),
            ("payment.events", "payment.*"),
        ],
        "booking-service" => &[
            ("user.events", "user.*"),
            ("event.events", "event.*"),
            ("payment.events", "payment.*"),
        ],
        "payment-service" => &[("booking.events", "booking.*"), ("event.events", "event.*")],
        "saga" => &[
            ("user.events", "user.*"),
            ("event.events", "event.*"),
            ("booking.events", "booking.*"),
            ("payment.events", "payment.*"),
        ],
        "notification-service" => {
            &[("booking.events", "booking.*"), ("payment.events", "payment.*")]
        }
        _ => &[],
    }
}

/// The exchange a given routing key (e.g. `"booking.initiated"`) should be
/// published to, derived from its leading domain segment.
///
/// # Errors
///
/// Returns [`crate::error::MessagingError::UnknownDomain`] if the routing
/// key's domain segment does not match one of the four fixed exchanges.
pub fn exchange_for_routing_key(routing_key: &str) -> Result<&'static str, crate::MessagingError> {
    let domain = routing_key
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| crate::MessagingError::UnknownDomain(routing_key.to_string()))?;

    EXCHANGES
        .iter()
        .copied()
        .find(|exchange| exchange.starts_with(domain))
        .ok_or_else(|| crate::MessagingError::UnknownDomain(routing_key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_service_binds_to_three_other_domains_not_its_own() {
        let bindings = bindings_for("booking-service");
        assert_eq!(bindings.len(), 3);
        assert!(bindings.iter().all(|(exchange, _)| *exchange != "booking.events"));
    }

    #[test]
    fn unrecognized_service_has_no_bindings() {
        assert!(bindings_for("unknown-service").is_empty());
    }

    #[test]
    fn saga_binds_to_every_domain_it_orchestrates() {
        assert_eq!(bindings_for("saga").len(), 4);
    }

    #[test]
    fn notification_service_binds_to_booking_and_payment_only() {
        let bindings = bindings_for("notification-service");
        assert_eq!(bindings.len(), 2);
        assert!(bindings.iter().any(|(exchange, _)| *exchange == "booking.events"));
        assert!(bindings.iter().any(|(exchange, _)| *exchange == "payment.events"));
    }

    #[test]
    #[allow(clippy::expect_used)] // Panics: test will fail if lookup fails
    fn routing_key_resolves_to_its_domain_exchange() {
        let exchange = exchange_for_routing_key("booking.initiated").expect("known domain");
        assert_eq!(exchange, "booking.events");
    }

    #[test]
    fn unknown_domain_routing_key_errors() {
        assert!(exchange_for_routing_key("widget.created").is_err());
    }
}
