//! Shopfront
//!
//! Storefront backend: a read-only product catalog, per-session shopping
//! carts, and an append-only order log, exposed over a REST API and
//! persisted in PostgreSQL.
//!
//! The interesting contract lives in [`store::Store`]: cart lines merge
//! additively per (session, product), and checkout atomically converts a
//! cart into an immutable order with line snapshots priced at conversion
//! time and a sequential `ORD-<n>` id, clearing the cart in the same unit.

pub mod api;
pub mod domain;
pub mod error;
pub mod store;

pub use domain::{CartEntry, CheckoutDetails, Order, OrderLine, OrderStatus, Product};
pub use error::{Result, StoreError};
pub use store::{CartPolicy, MemoryStore, PgStore, Store};
