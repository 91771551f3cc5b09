//! Core storefront types: catalog products, cart lines, and order snapshots.
//!
//! Wire representation is camelCase JSON, matching what the browser client
//! expects (`totalAmount`, `inStock`, `createdAt`, ...).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A catalog product. Read-only as far as the cart/order core is concerned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub description: String,
    pub image: String,
    pub category: String,
    pub in_stock: bool,
    pub rating: f64,
}

/// One cart line as returned to callers: the product resolved fresh from the
/// catalog at read time, plus the accumulated quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartEntry {
    pub product: Product,
    pub quantity: u32,
}

/// An immutable copy of a product's name and price captured when the order
/// was placed. Later catalog edits do not touch it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub product_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

impl OrderLine {
    /// Snapshots a product at the given quantity, fixing the subtotal.
    pub fn snapshot(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            product_price: product.price,
            quantity,
            subtotal: product.price * Decimal::from(quantity),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(StoreError::InvalidInput(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// Customer contact and shipping fields collected at checkout. All free-form;
/// the core enforces nothing here beyond the cart being non-empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
}

/// A placed order: header plus its line snapshots. Append-only; only the
/// status field may ever change, and never through this core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub items: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Sum of line subtotals. Equals `total_amount` at creation time.
    pub fn line_total(&self) -> Decimal {
        self.items.iter().map(|l| l.subtotal).sum()
    }
}
