use std::time::Duration;

/// Stand-in for the payment provider. A real integration would create a
/// checkout session server-side; this resolves after a fixed simulated
/// delay, and the caller flips the premium flag through the profile
/// endpoint once it returns.
pub const CHECKOUT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Pris-ID mangler.")]
    MissingPriceId,
}

pub async fn redirect_to_checkout(price_id: &str) -> Result<(), CheckoutError> {
    tracing::info!("Simulating checkout for price ID: {price_id}");

    // Simulate network delay
    tokio::time::sleep(CHECKOUT_DELAY).await;

    if price_id.is_empty() {
        return Err(CheckoutError::MissingPriceId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn succeeds_for_any_price_id() {
        assert_eq!(redirect_to_checkout("price_premium_monthly").await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn fails_without_a_price_id() {
        assert_eq!(
            redirect_to_checkout("").await,
            Err(CheckoutError::MissingPriceId)
        );
    }
}
