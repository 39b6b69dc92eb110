use crate::models::order::DeliveryPhase;

/// Phase an order must currently hold for `to` to be a legal rider-driven
/// transition. `None` means riders can never request `to` directly.
pub fn required_source(to: DeliveryPhase) -> Option<DeliveryPhase> {
    match to {
        DeliveryPhase::OutForDelivery => Some(DeliveryPhase::Assigned),
        DeliveryPhase::Delivered => Some(DeliveryPhase::OutForDelivery),
        _ => None,
    }
}

pub fn is_terminal(phase: DeliveryPhase) -> bool {
    matches!(phase, DeliveryPhase::Delivered | DeliveryPhase::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_name_their_source() {
        assert_eq!(
            required_source(DeliveryPhase::OutForDelivery),
            Some(DeliveryPhase::Assigned)
        );
        assert_eq!(
            required_source(DeliveryPhase::Delivered),
            Some(DeliveryPhase::OutForDelivery)
        );
    }

    #[test]
    fn riders_cannot_request_other_phases() {
        assert_eq!(required_source(DeliveryPhase::PendingAssignment), None);
        assert_eq!(required_source(DeliveryPhase::Assigned), None);
        assert_eq!(required_source(DeliveryPhase::Cancelled), None);
    }

    #[test]
    fn delivered_and_cancelled_are_terminal() {
        assert!(is_terminal(DeliveryPhase::Delivered));
        assert!(is_terminal(DeliveryPhase::Cancelled));
        assert!(!is_terminal(DeliveryPhase::OutForDelivery));
    }
}
