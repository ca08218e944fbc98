pub mod gateway;
pub mod reconciler;

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::models::order::OrderStatus;

/// Cent-level tolerance used when comparing monetary amounts.
pub fn amounts_match(a: &BigDecimal, b: &BigDecimal) -> bool {
    let tolerance = BigDecimal::from_str("0.01").unwrap();
    (a - b).abs() <= tolerance
}

/// Returns the status to write, or `None` when the order already carries the
/// mapped status and no write is needed. Shared by the webhook handler and
/// the reconciler so replayed notifications stay no-ops.
pub fn status_transition(current: &str, mapped: OrderStatus) -> Option<OrderStatus> {
    if current == mapped.as_str() {
        None
    } else {
        Some(mapped)
    }
}

/// Decides the order status a webhook notification should produce.
///
/// An amount that disagrees with the order total by more than the tolerance
/// marks the order failed regardless of what the provider claims.
pub fn resolve_webhook_status(
    provider_status: &str,
    webhook_amount: &BigDecimal,
    order_total: &BigDecimal,
) -> OrderStatus {
    if !amounts_match(webhook_amount, order_total) {
        return OrderStatus::Failed;
    }
    OrderStatus::from_provider(provider_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn amounts_equal_within_a_cent() {
        assert!(amounts_match(&dec("100.00"), &dec("100.00")));
        assert!(amounts_match(&dec("100.00"), &dec("100.01")));
        assert!(amounts_match(&dec("100.01"), &dec("100.00")));
    }

    #[test]
    fn amounts_differing_by_more_than_a_cent_mismatch() {
        assert!(!amounts_match(&dec("100.00"), &dec("100.02")));
        assert!(!amounts_match(&dec("99.98"), &dec("100.00")));
    }

    #[test]
    fn webhook_amount_mismatch_fails_even_when_provider_says_paid() {
        let status = resolve_webhook_status("paid", &dec("50.00"), &dec("100.00"));
        assert_eq!(status, OrderStatus::Failed);
    }

    #[test]
    fn matching_current_status_yields_no_write() {
        assert_eq!(status_transition("PAID", OrderStatus::Paid), None);
        assert_eq!(
            status_transition("PROCESSING_PAYMENT", OrderStatus::ProcessingPayment),
            None
        );
    }

    #[test]
    fn differing_status_yields_the_mapped_one() {
        assert_eq!(
            status_transition("PROCESSING_PAYMENT", OrderStatus::Paid),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            status_transition("PENDING", OrderStatus::Failed),
            Some(OrderStatus::Failed)
        );
    }

    #[test]
    fn webhook_matching_amount_uses_provider_status() {
        assert_eq!(
            resolve_webhook_status("paid", &dec("100.00"), &dec("100.00")),
            OrderStatus::Paid
        );
        assert_eq!(
            resolve_webhook_status("processing", &dec("100.00"), &dec("100.00")),
            OrderStatus::ProcessingPayment
        );
    }
}
