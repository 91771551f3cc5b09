//! PostgreSQL-backed store.
//!
//! Checkout runs as a single transaction: the session's cart rows are read
//! `FOR UPDATE`, so two concurrent `place_order` calls for one session
//! serialize on the row locks; the loser re-reads an empty cart after the
//! winner commits and fails with `EmptyCart`. Order ids come from a dedicated
//! sequence (`order_seq`), which stays unique under concurrent checkouts from
//! different sessions; gaps from rolled-back transactions are acceptable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::domain::{CartEntry, CheckoutDetails, Order, OrderLine, Product};
use crate::error::{Result, StoreError};
use crate::store::{CartPolicy, Store};

pub struct PgStore {
    pool: PgPool,
    policy: CartPolicy,
}

impl PgStore {
    pub fn new(pool: PgPool, policy: CartPolicy) -> Self {
        Self { pool, policy }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: String,
    name: String,
    price: Decimal,
    description: String,
    image: String,
    category: String,
    in_stock: bool,
    rating: f64,
    quantity: i32,
}

impl From<CartRow> for CartEntry {
    fn from(row: CartRow) -> Self {
        CartEntry {
            product: Product {
                id: row.id,
                name: row.name,
                price: row.price,
                description: row.description,
                image: row.image,
                category: row.category,
                in_stock: row.in_stock,
                rating: row.rating,
            },
            quantity: row.quantity as u32,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PricedLineRow {
    product_id: String,
    name: String,
    price: Decimal,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct OrderHeaderRow {
    id: String,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_address: Option<String>,
    customer_phone: Option<String>,
    status: String,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    product_id: String,
    product_name: String,
    product_price: Decimal,
    quantity: i32,
    subtotal: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        OrderLine {
            product_id: row.product_id,
            product_name: row.product_name,
            product_price: row.product_price,
            quantity: row.quantity as u32,
            subtotal: row.subtotal,
        }
    }
}

fn assemble_order(header: OrderHeaderRow, lines: Vec<OrderLineRow>) -> Result<Order> {
    Ok(Order {
        status: header.status.parse()?,
        id: header.id,
        customer_name: header.customer_name,
        customer_email: header.customer_email,
        customer_address: header.customer_address,
        customer_phone: header.customer_phone,
        total_amount: header.total_amount,
        items: lines.into_iter().map(OrderLine::from).collect(),
        created_at: header.created_at,
    })
}

const CART_SELECT: &str = "SELECT p.id, p.name, p.price, p.description, p.image, p.category, \
     p.in_stock, p.rating, ci.quantity \
     FROM cart_items ci JOIN products p ON p.id = ci.product_id \
     WHERE ci.session_id = $1 ORDER BY ci.position";

const ORDER_LINES_SELECT: &str = "SELECT product_id, product_name, product_price, quantity, subtotal \
     FROM order_items WHERE order_id = $1 ORDER BY id";

#[async_trait]
impl Store for PgStore {
    async fn product(&self, id: &str) -> Result<Product> {
        sqlx::query_as::<_, Product>(
            "SELECT id, name, price, description, image, category, in_stock, rating \
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::product_not_found(id))
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let pattern = format!("%{query}%");
        Ok(sqlx::query_as::<_, Product>(
            "SELECT id, name, price, description, image, category, in_stock, rating \
             FROM products WHERE name ILIKE $1 OR description ILIKE $1 ORDER BY name",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(sqlx::query_as::<_, Product>(
            "SELECT id, name, price, description, image, category, in_stock, rating \
             FROM products ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn cart(&self, session: &str) -> Result<Vec<CartEntry>> {
        let rows = sqlx::query_as::<_, CartRow>(CART_SELECT)
            .bind(session)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CartEntry::from).collect())
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
        self.policy.check(quantity)?;

        let mut tx = self.pool.begin().await?;
        let known: Option<i32> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if known.is_none() {
            return Err(StoreError::product_not_found(product_id));
        }

        // The upsert merges additively; the row lock it takes serializes
        // concurrent adds to the same line, so the returned quantity is the
        // true post-merge value and the policy check holds at commit.
        let merged: i32 = sqlx::query_scalar(
            "INSERT INTO cart_items (session_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (session_id, product_id) \
             DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW() \
             RETURNING quantity",
        )
        .bind(session)
        .bind(product_id)
        .bind(quantity as i32)
        .fetch_one(&mut *tx)
        .await?;
        self.policy.check(merged as u32)?;
        tx.commit().await?;

        self.cart(session).await
    }

    async fn set_cart_quantity(
        &self,
        session: &str,
        product_id: &str,
        quantity: u32,
    ) -> Result<Vec<CartEntry>> {
        if quantity == 0 {
            return self.remove_from_cart(session, product_id).await;
        }
        self.policy.check(quantity)?;
        sqlx::query(
            "UPDATE cart_items SET quantity = $3, updated_at = NOW() \
             WHERE session_id = $1 AND product_id = $2",
        )
        .bind(session)
        .bind(product_id)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;
        self.cart(session).await
    }

    async fn remove_from_cart(&self, session: &str, product_id: &str) -> Result<Vec<CartEntry>> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND product_id = $2")
            .bind(session)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        self.cart(session).await
    }

    async fn clear_cart(&self, session: &str) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(session)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn place_order(&self, session: &str, details: CheckoutDetails) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let lines = sqlx::query_as::<_, PricedLineRow>(
            "SELECT ci.product_id, p.name, p.price, ci.quantity \
             FROM cart_items ci JOIN products p ON p.id = ci.product_id \
             WHERE ci.session_id = $1 ORDER BY ci.position FOR UPDATE OF ci",
        )
        .bind(session)
        .fetch_all(&mut *tx)
        .await?;
        if lines.is_empty() {
            return Err(StoreError::EmptyCart);
        }

        let items: Vec<OrderLine> = lines
            .iter()
            .map(|l| OrderLine {
                product_id: l.product_id.clone(),
                product_name: l.name.clone(),
                product_price: l.price,
                quantity: l.quantity as u32,
                subtotal: l.price * Decimal::from(l.quantity),
            })
            .collect();
        let total_amount: Decimal = items.iter().map(|l| l.subtotal).sum();

        let (seq,): (i64,) = sqlx::query_as("SELECT nextval('order_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let order_id = format!("ORD-{seq}");

        let created_at: DateTime<Utc> = sqlx::query_scalar(
            "INSERT INTO orders \
             (id, customer_name, customer_email, customer_address, customer_phone, status, total_amount) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING created_at",
        )
        .bind(&order_id)
        .bind(&details.customer_name)
        .bind(&details.customer_email)
        .bind(&details.customer_address)
        .bind(&details.customer_phone)
        .bind("pending")
        .bind(total_amount)
        .fetch_one(&mut *tx)
        .await?;

        for line in &items {
            sqlx::query(
                "INSERT INTO order_items \
                 (order_id, product_id, product_name, product_price, quantity, subtotal) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&order_id)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.product_price)
            .bind(line.quantity as i32)
            .bind(line.subtotal)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(session)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(order_id = %order_id, %total_amount, "order placed");

        Ok(Order {
            id: order_id,
            customer_name: details.customer_name,
            customer_email: details.customer_email,
            customer_address: details.customer_address,
            customer_phone: details.customer_phone,
            status: Default::default(),
            total_amount,
            items,
            created_at,
        })
    }

    async fn order(&self, id: &str) -> Result<Order> {
        let header = sqlx::query_as::<_, OrderHeaderRow>(
            "SELECT id, customer_name, customer_email, customer_address, customer_phone, \
             status, total_amount, created_at FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::order_not_found(id))?;

        let lines = sqlx::query_as::<_, OrderLineRow>(ORDER_LINES_SELECT)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        assemble_order(header, lines)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let headers = sqlx::query_as::<_, OrderHeaderRow>(
            "SELECT id, customer_name, customer_email, customer_address, customer_phone, \
             status, total_amount, created_at FROM orders ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(headers.len());
        for header in headers {
            let lines = sqlx::query_as::<_, OrderLineRow>(ORDER_LINES_SELECT)
                .bind(&header.id)
                .fetch_all(&self.pool)
                .await?;
            orders.push(assemble_order(header, lines)?);
        }
        Ok(orders)
    }
}
