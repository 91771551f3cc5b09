//! In-memory store, used by tests and local development.
//!
//! All state sits behind one mutex, so every operation, including the
//! read-snapshot-write-clear sequence of `place_order`, is atomic by
//! construction. Order numbers come from an atomic counter, mirroring the
//! sequence the Postgres store uses.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{CartEntry, CheckoutDetails, Order, OrderLine, OrderStatus, Product};
use crate::error::{Result, StoreError};
use crate::store::{CartPolicy, Store};

#[derive(Default)]
struct State {
    products: Vec<Product>,
    // session -> insertion-ordered (product_id, quantity) lines
    carts: HashMap<String, Vec<(String, u32)>>,
    orders: Vec<Order>,
}

pub struct MemoryStore {
    state: Mutex<State>,
    next_order: AtomicU64,
    policy: CartPolicy,
}

impl MemoryStore {
    pub fn new(products: Vec<Product>) -> Self {
        Self::with_policy(products, CartPolicy::default())
    }

    pub fn with_policy(products: Vec<Product>, policy: CartPolicy) -> Self {
        Self {
            state: Mutex::new(State { products, ..State::default() }),
            next_order: AtomicU64::new(1),
            policy,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // Recover the guard even if another test thread panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl State {
    fn product(&self, id: &str) -> Result<&Product> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::product_not_found(id))
    }

    fn resolved_cart(&self, session: &str) -> Result<Vec<CartEntry>> {
        let Some(lines) = self.carts.get(session) else {
            return Ok(Vec::new());
        };
        lines
            .iter()
            .map(|(product_id, quantity)| {
                Ok(CartEntry { product: self.product(product_id)?.clone(), quantity: *quantity })
            })
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn product(&self, id: &str) -> Result<Product> {
        self.lock().product(id).cloned()
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let needle = query.to_lowercase();
        let mut matches: Vec<Product> = self
            .lock()
            .products
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matches)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let mut products = self.lock().products.clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn cart(&self, session: &str) -> Result<Vec<CartEntry>> {
        self.lock().resolved_cart(session)
    }

    async fn add_to_cart(
        &self,
        session: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<Vec<CartEntry>> {
        if quantity == 0 {
            return Err(StoreError::InvalidInput("quantity must be at least 1".into()));
        }
        let mut state = self.lock();
        state.product(product_id)?;

        let lines = state.carts.entry(session.to_string()).or_default();
        match lines.iter_mut().find(|(id, _)| id == product_id) {
            Some((_, existing)) => {
                let merged = existing.saturating_add(quantity);
                self.policy.check(merged)?;
                *existing = merged;
            }
            None => {
                self.policy.check(quantity)?;
                lines.push((product_id.to_string(), quantity));
            }
        }
        state.resolved_cart(session)
    }

    async fn set_cart_quantity(
        &self,
        session: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<Vec<CartEntry>> {
        if quantity > 0 {
            self.policy.check(quantity)?;
        }
        let mut state = self.lock();
        if let Some(lines) = state.carts.get_mut(session) {
            if quantity == 0 {
                lines.retain(|(id, _)| id != product_id);
            } else if let Some((_, existing)) = lines.iter_mut().find(|(id, _)| id == product_id) {
                *existing = quantity;
            }
        }
        state.resolved_cart(session)
    }

    async fn remove_from_cart(&self, session: &str, product_id: &str) -> Result<Vec<CartEntry>> {
        let mut state = self.lock();
        if let Some(lines) = state.carts.get_mut(session) {
            lines.retain(|(id, _)| id != product_id);
        }
        state.resolved_cart(session)
    }

    async fn clear_cart(&self, session: &str) -> Result<()> {
        self.lock().carts.remove(session);
        Ok(())
    }

    async fn place_order(&self, session: &str, details: CheckoutDetails) -> Result<Order> {
        let mut state = self.lock();

        let items: Vec<OrderLine> = match state.carts.get(session) {
            Some(lines) if !lines.is_empty() => lines
                .iter()
                .map(|(product_id, quantity)| {
                    Ok(OrderLine::snapshot(state.product(product_id)?, *quantity))
                })
                .collect::<Result<_>>()?,
            _ => return Err(StoreError::EmptyCart),
        };
        let total_amount = items.iter().map(|l| l.subtotal).sum();

        let seq = self.next_order.fetch_add(1, Ordering::Relaxed);
        let order = Order {
            id: format!("ORD-{seq}"),
            customer_name: details.customer_name,
            customer_email: details.customer_email,
            customer_address: details.customer_address,
            customer_phone: details.customer_phone,
            status: OrderStatus::Pending,
            total_amount,
            items,
            created_at: Utc::now(),
        };

        state.orders.push(order.clone());
        state.carts.remove(session);
        Ok(order)
    }

    async fn order(&self, id: &str) -> Result<Order> {
        self.lock()
            .orders
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .ok_or_else(|| StoreError::order_not_found(id))
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        // Append-only, so reverse insertion order is createdAt-descending.
        Ok(self.lock().orders.iter().rev().cloned().collect())
    }
}
