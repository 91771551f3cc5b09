//! Storage contract for the catalog, per-session carts, and the order log.
//!
//! Carts are keyed by an opaque caller-supplied session id. All multi-step
//! operations (notably [`Store::place_order`]) are atomic with respect to
//! concurrent calls, including concurrent calls for the same session.

use async_trait::async_trait;

use crate::domain::{CartEntry, CheckoutDetails, Order, Product};
use crate::error::{Result, StoreError};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Cart limits. The default enforces nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct CartPolicy {
    /// Ceiling on a single line's quantity, after merging. `None` = unbounded.
    pub max_quantity: Option<u32>,
}

impl CartPolicy {
    pub fn check(&self, quantity: u32) -> Result<()> {
        match self.max_quantity {
            Some(max) if quantity > max => Err(StoreError::InvalidInput(format!(
                "quantity {quantity} exceeds the per-item limit of {max}"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // Catalog. Read-only; owned outside this core.

    async fn product(&self, id: &str) -> Result<Product>;

    /// Case-insensitive substring match over name and description,
    /// name-ascending.
    async fn search_products(&self, query: &str) -> Result<Vec<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    // Cart. One line per (session, product); quantities are always >= 1.

    /// The session's cart in insertion order, each product resolved fresh
    /// from the catalog.
    async fn cart(&self, session: &str) -> Result<Vec<CartEntry>>;

    /// Adds `quantity` of a product, merging additively with any existing
    /// line. Fails with `NotFound` for an unknown product and `InvalidInput`
    /// for a zero quantity or a policy violation; the cart is unchanged on
    /// failure. Returns the updated cart.
    async fn add_to_cart(&self, session: &str, product_id: &str, quantity: u32)
        -> Result<Vec<CartEntry>>;

    /// Sets a line's quantity absolutely. Zero deletes the line; a missing
    /// line is a no-op. Returns the updated cart.
    async fn set_cart_quantity(&self, session: &str, product_id: &str, quantity: u32)
        -> Result<Vec<CartEntry>>;

    /// Deletes the line if present; idempotent. Returns the updated cart.
    async fn remove_from_cart(&self, session: &str, product_id: &str) -> Result<Vec<CartEntry>>;

    /// Deletes every line for the session.
    async fn clear_cart(&self, session: &str) -> Result<()>;

    // Orders. Append-only log.

    /// Converts the session's cart into an order: snapshots each line at the
    /// catalog's current name and price, sums the total, assigns the next
    /// "ORD-<n>" id, persists the order, and clears the cart, all as one
    /// atomic unit. An empty cart fails with `EmptyCart` and creates nothing.
    /// On any failure the cart is left exactly as it was.
    async fn place_order(&self, session: &str, details: CheckoutDetails) -> Result<Order>;

    async fn order(&self, id: &str) -> Result<Order>;

    /// All orders, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_unbounded() {
        let policy = CartPolicy::default();
        assert!(policy.check(u32::MAX).is_ok());
    }

    #[test]
    fn policy_rejects_over_limit() {
        let policy = CartPolicy { max_quantity: Some(10) };
        assert!(policy.check(10).is_ok());
        assert!(matches!(policy.check(11), Err(StoreError::InvalidInput(_))));
    }
}
