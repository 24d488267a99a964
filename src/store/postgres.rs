use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;
use std::fmt::Display;
use uuid::Uuid;

use super::{Page, ProductFilter, ProductSort, Repository, StoreError, StoreResult};
use crate::domain::aggregates::{
    Delivery, LineItem, Order, OrderStatus, Payment, PendingCharge, Product, Review, Rider, StatusChange, User,
};
use crate::domain::value_objects::{CampusZone, Money};

#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
        Ok(Self::new(pool))
    }
}

fn corrupt(e: impl Display) -> StoreError { StoreError::Corrupt(e.to_string()) }

fn unique_violation(err: sqlx::Error, what: &'static str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate(what);
        }
    }
    StoreError::Database(err)
}

fn zone(value: String) -> StoreResult<CampusZone> { CampusZone::new(value).map_err(corrupt) }

fn count(value: i64) -> u64 { u64::try_from(value).unwrap_or(0) }

fn as_i32(value: u32) -> StoreResult<i32> { i32::try_from(value).map_err(corrupt) }

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    campus_zone: Option<String>,
    role: String,
    is_active: bool,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;
    fn try_from(r: UserRow) -> StoreResult<Self> {
        Ok(User {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            campus_zone: r.campus_zone.map(zone).transpose()?,
            role: r.role.parse().map_err(corrupt)?,
            is_active: r.is_active,
            password_hash: r.password_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    seller_id: Uuid,
    title: String,
    description: String,
    price: Decimal,
    currency: String,
    category: String,
    condition: String,
    campus_zone: String,
    images: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;
    fn try_from(r: ProductRow) -> StoreResult<Self> {
        Ok(Product {
            id: r.id,
            seller_id: r.seller_id,
            title: r.title,
            description: r.description,
            price: Money::new(r.price, &r.currency),
            category: r.category,
            condition: r.condition.parse().map_err(corrupt)?,
            campus_zone: zone(r.campus_zone)?,
            images: r.images,
            status: r.status.parse().map_err(corrupt)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    total: Decimal,
    currency: String,
    delivery_address: String,
    campus_zone: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: Uuid,
    product_id: Uuid,
    title: String,
    quantity: i32,
    unit_price: Decimal,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>) -> StoreResult<Order> {
        let items = items
            .into_iter()
            .map(|i| {
                Ok(LineItem {
                    product_id: i.product_id,
                    title: i.title,
                    quantity: u32::try_from(i.quantity).map_err(corrupt)?,
                    unit_price: Money::new(i.unit_price, &self.currency),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            customer_id: self.customer_id,
            items,
            total: Money::new(self.total, &self.currency),
            delivery_address: self.delivery_address,
            campus_zone: zone(self.campus_zone)?,
            status: self.status.parse().map_err(corrupt)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    order_id: Uuid,
    method: String,
    status: String,
    amount_total: Decimal,
    amount_paid: Decimal,
    currency: String,
    due_date: Option<NaiveDate>,
    charge_reference: Option<String>,
    charge_amount: Option<Decimal>,
    charge_phone: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = StoreError;
    fn try_from(r: PaymentRow) -> StoreResult<Self> {
        let pending_charge = match (r.charge_reference, r.charge_amount, r.charge_phone) {
            (Some(reference), Some(amount), Some(phone_number)) => {
                Some(PendingCharge { reference, amount: Money::new(amount, &r.currency), phone_number })
            }
            (None, None, None) => None,
            _ => return Err(StoreError::Corrupt(format!("partial charge on payment {}", r.order_id))),
        };
        Ok(Payment {
            order_id: r.order_id,
            method: r.method.parse().map_err(corrupt)?,
            status: r.status.parse().map_err(corrupt)?,
            amount_total: Money::new(r.amount_total, &r.currency),
            amount_paid: Money::new(r.amount_paid, &r.currency),
            due_date: r.due_date,
            pending_charge,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    order_id: Uuid,
    status: String,
    rider_id: Option<Uuid>,
    assigned_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    estimated_arrival: Option<DateTime<Utc>>,
    history: Json<Vec<StatusChange>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = StoreError;
    fn try_from(r: DeliveryRow) -> StoreResult<Self> {
        Ok(Delivery {
            order_id: r.order_id,
            status: r.status.parse().map_err(corrupt)?,
            rider_id: r.rider_id,
            assigned_at: r.assigned_at,
            delivered_at: r.delivered_at,
            estimated_arrival: r.estimated_arrival,
            history: r.history.0,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct RiderRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    zone: String,
    is_available: bool,
    total_deliveries: i32,
    rating: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RiderRow> for Rider {
    type Error = StoreError;
    fn try_from(r: RiderRow) -> StoreResult<Self> {
        Ok(Rider {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            zone: zone(r.zone)?,
            is_available: r.is_available,
            total_deliveries: u32::try_from(r.total_deliveries).map_err(corrupt)?,
            rating: r.rating,
            created_at: r.created_at,
            updated_at: r.updated_at,
            events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    product_id: Uuid,
    author_id: Uuid,
    author_name: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = StoreError;
    fn try_from(r: ReviewRow) -> StoreResult<Self> {
        Ok(Review {
            id: r.id,
            product_id: r.product_id,
            author_id: r.author_id,
            author_name: r.author_name,
            rating: u8::try_from(r.rating).map_err(corrupt)?,
            comment: r.comment,
            created_at: r.created_at,
        })
    }
}

const PRODUCT_FILTER: &str = "status = 'active' \
    AND ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1) \
    AND ($2::text IS NULL OR category = $2) \
    AND ($3::text IS NULL OR condition = $3) \
    AND ($4::text IS NULL OR campus_zone = $4) \
    AND ($5::numeric IS NULL OR price >= $5) \
    AND ($6::numeric IS NULL OR price <= $6) \
    AND ($7::uuid IS NULL OR seller_id = $7)";

impl PgRepository {
    async fn order_items(&self, order_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<OrderItemRow>>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT order_id, product_id, title, quantity, unit_price FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, name, email, phone, campus_zone, role, is_active, password_hash, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(user.id).bind(&user.name).bind(&user.email).bind(&user.phone)
            .bind(user.campus_zone.as_ref().map(CampusZone::as_str)).bind(user.role.as_str())
            .bind(user.is_active).bind(&user.password_hash).bind(user.created_at).bind(user.updated_at)
            .execute(&self.pool).await.map_err(|e| unique_violation(e, "email"))?;
        Ok(())
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let done = sqlx::query("UPDATE users SET name = $2, phone = $3, campus_zone = $4, role = $5, is_active = $6, password_hash = $7, updated_at = $8 WHERE id = $1")
            .bind(user.id).bind(&user.name).bind(&user.phone)
            .bind(user.campus_zone.as_ref().map(CampusZone::as_str)).bind(user.role.as_str())
            .bind(user.is_active).bind(&user.password_hash).bind(user.updated_at)
            .execute(&self.pool).await?;
        if done.rows_affected() == 0 { return Err(StoreError::Missing("user")); }
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase()).fetch_optional(&self.pool).await?
            .map(User::try_from).transpose()
    }

    async fn list_users(&self, page: Page) -> StoreResult<(Vec<User>, u64)> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users ORDER BY created_at LIMIT $1 OFFSET $2")
            .bind(i64::from(page.per_page)).bind(page.offset() as i64)
            .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;
        let users = rows.into_iter().map(User::try_from).collect::<StoreResult<_>>()?;
        Ok((users, count(total.0)))
    }

    async fn save_product(&self, p: &Product) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO products (id, seller_id, title, description, price, currency, category, condition, campus_zone, images, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (id) DO UPDATE SET title = $3, description = $4, price = $5, currency = $6, category = $7, condition = $8, images = $10, status = $11, updated_at = $13",
        )
        .bind(p.id).bind(p.seller_id).bind(&p.title).bind(&p.description)
        .bind(p.price.amount()).bind(p.price.currency()).bind(&p.category).bind(p.condition.as_str())
        .bind(p.campus_zone.as_str()).bind(&p.images).bind(p.status.as_str())
        .bind(p.created_at).bind(p.updated_at)
        .execute(&self.pool).await?;
        Ok(())
    }

    async fn find_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn list_products(&self, filter: &ProductFilter, page: Page) -> StoreResult<(Vec<Product>, u64)> {
        let order_by = match filter.sort {
            ProductSort::Newest => "created_at DESC, id DESC",
            ProductSort::PriceAsc => "price ASC, id",
            ProductSort::PriceDesc => "price DESC, id",
        };
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| format!("%{s}%"));
        let category = filter.category.as_deref().map(|c| c.trim().to_lowercase());
        let condition = filter.condition.map(|c| c.as_str());
        let zone = filter.zone.as_deref().map(|z| z.trim().to_uppercase());

        let select = format!("SELECT * FROM products WHERE {PRODUCT_FILTER} ORDER BY {order_by} LIMIT $8 OFFSET $9");
        let rows = sqlx::query_as::<_, ProductRow>(&select)
            .bind(&search).bind(&category).bind(condition).bind(&zone)
            .bind(filter.min_price).bind(filter.max_price).bind(filter.seller_id)
            .bind(i64::from(page.per_page)).bind(page.offset() as i64)
            .fetch_all(&self.pool).await?;

        let count_sql = format!("SELECT COUNT(*) FROM products WHERE {PRODUCT_FILTER}");
        let total: (i64,) = sqlx::query_as(&count_sql)
            .bind(&search).bind(&category).bind(condition).bind(&zone)
            .bind(filter.min_price).bind(filter.max_price).bind(filter.seller_id)
            .fetch_one(&self.pool).await?;

        let products = rows.into_iter().map(Product::try_from).collect::<StoreResult<_>>()?;
        Ok((products, count(total.0)))
    }

    async fn insert_order(&self, order: &Order, payment: &Payment, delivery: &Delivery) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO orders (id, order_number, customer_id, total, currency, delivery_address, campus_zone, status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
            .bind(order.id).bind(&order.order_number).bind(order.customer_id)
            .bind(order.total.amount()).bind(order.total.currency()).bind(&order.delivery_address)
            .bind(order.campus_zone.as_str()).bind(order.status.as_str()).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *tx).await.map_err(|e| unique_violation(e, "order number"))?;
        for (position, item) in order.items.iter().enumerate() {
            sqlx::query("INSERT INTO order_items (order_id, position, product_id, title, quantity, unit_price) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(order.id).bind(i32::try_from(position).map_err(corrupt)?).bind(item.product_id)
                .bind(&item.title).bind(as_i32(item.quantity)?).bind(item.unit_price.amount())
                .execute(&mut *tx).await?;
        }
        upsert_payment(&mut *tx, payment).await?;
        upsert_delivery(&mut *tx, delivery).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_order(&self, order: &Order) -> StoreResult<()> {
        update_order(&self.pool, order).await
    }

    async fn find_order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
        else {
            return Ok(None);
        };
        let mut items = self.order_items(&[id]).await?;
        row.into_order(items.remove(&id).unwrap_or_default()).map(Some)
    }

    async fn list_orders(&self, customer_id: Option<Uuid>, status: Option<OrderStatus>, page: Page) -> StoreResult<(Vec<Order>, u64)> {
        let status = status.map(|s| s.as_str());
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders WHERE ($1::uuid IS NULL OR customer_id = $1) AND ($2::text IS NULL OR status = $2) ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
        )
        .bind(customer_id).bind(status).bind(i64::from(page.per_page)).bind(page.offset() as i64)
        .fetch_all(&self.pool).await?;
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::uuid IS NULL OR customer_id = $1) AND ($2::text IS NULL OR status = $2)")
            .bind(customer_id).bind(status)
            .fetch_one(&self.pool).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = self.order_items(&ids).await?;
        let orders = rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect::<StoreResult<_>>()?;
        Ok((orders, count(total.0)))
    }

    async fn save_payment(&self, payment: &Payment) -> StoreResult<()> {
        upsert_payment(&self.pool, payment).await
    }

    async fn find_payment(&self, order_id: Uuid) -> StoreResult<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE order_id = $1")
            .bind(order_id).fetch_optional(&self.pool).await?
            .map(Payment::try_from).transpose()
    }

    async fn find_payment_by_reference(&self, reference: &str) -> StoreResult<Option<Payment>> {
        sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments WHERE charge_reference = $1")
            .bind(reference).fetch_optional(&self.pool).await?
            .map(Payment::try_from).transpose()
    }

    async fn save_delivery(&self, delivery: &Delivery) -> StoreResult<()> {
        upsert_delivery(&self.pool, delivery).await
    }

    async fn save_delivery_progress(&self, delivery: &Delivery, order: &Order, rider: Option<&Rider>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        upsert_delivery(&mut *tx, delivery).await?;
        update_order(&mut *tx, order).await?;
        if let Some(rider) = rider {
            update_rider(&mut *tx, rider).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_delivery(&self, order_id: Uuid) -> StoreResult<Option<Delivery>> {
        sqlx::query_as::<_, DeliveryRow>("SELECT * FROM deliveries WHERE order_id = $1")
            .bind(order_id).fetch_optional(&self.pool).await?
            .map(Delivery::try_from).transpose()
    }

    async fn insert_rider(&self, r: &Rider) -> StoreResult<()> {
        sqlx::query("INSERT INTO riders (id, user_id, name, zone, is_available, total_deliveries, rating, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
            .bind(r.id).bind(r.user_id).bind(&r.name).bind(r.zone.as_str()).bind(r.is_available)
            .bind(as_i32(r.total_deliveries)?).bind(r.rating).bind(r.created_at).bind(r.updated_at)
            .execute(&self.pool).await.map_err(|e| unique_violation(e, "rider"))?;
        Ok(())
    }

    async fn save_rider(&self, r: &Rider) -> StoreResult<()> {
        update_rider(&self.pool, r).await
    }

    async fn find_rider(&self, id: Uuid) -> StoreResult<Option<Rider>> {
        sqlx::query_as::<_, RiderRow>("SELECT * FROM riders WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Rider::try_from).transpose()
    }

    async fn find_rider_by_user(&self, user_id: Uuid) -> StoreResult<Option<Rider>> {
        sqlx::query_as::<_, RiderRow>("SELECT * FROM riders WHERE user_id = $1")
            .bind(user_id).fetch_optional(&self.pool).await?
            .map(Rider::try_from).transpose()
    }

    async fn list_riders(&self, zone: Option<&str>) -> StoreResult<Vec<Rider>> {
        sqlx::query_as::<_, RiderRow>("SELECT * FROM riders WHERE ($1::text IS NULL OR zone = $1) ORDER BY name")
            .bind(zone.map(|z| z.trim().to_uppercase()))
            .fetch_all(&self.pool).await?
            .into_iter().map(Rider::try_from).collect()
    }

    async fn insert_review(&self, r: &Review) -> StoreResult<()> {
        sqlx::query("INSERT INTO reviews (id, product_id, author_id, author_name, rating, comment, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(r.id).bind(r.product_id).bind(r.author_id).bind(&r.author_name)
            .bind(i16::from(r.rating)).bind(&r.comment).bind(r.created_at)
            .execute(&self.pool).await.map_err(|e| unique_violation(e, "review"))?;
        Ok(())
    }

    async fn list_reviews(&self, product_id: Uuid) -> StoreResult<Vec<Review>> {
        sqlx::query_as::<_, ReviewRow>("SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC")
            .bind(product_id).fetch_all(&self.pool).await?
            .into_iter().map(Review::try_from).collect()
    }

    async fn cart_lines(&self, user_id: Uuid) -> StoreResult<Vec<(Uuid, u32)>> {
        let rows: Vec<(Uuid, i32)> = sqlx::query_as("SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY added_at, product_id")
            .bind(user_id).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(product_id, qty)| Ok((product_id, u32::try_from(qty).map_err(corrupt)?)))
            .collect()
    }

    async fn set_cart_quantity(&self, user_id: Uuid, product_id: Uuid, quantity: u32) -> StoreResult<()> {
        if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id).bind(product_id).execute(&self.pool).await?;
        } else {
            sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity")
                .bind(user_id).bind(product_id).bind(as_i32(quantity)?)
                .execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn clear_cart(&self, user_id: Uuid) -> StoreResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(())
    }
}

async fn upsert_payment<'e, E>(executor: E, p: &Payment) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let charge = p.pending_charge.as_ref();
    sqlx::query(
        "INSERT INTO payments (order_id, method, status, amount_total, amount_paid, currency, due_date, charge_reference, charge_amount, charge_phone, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (order_id) DO UPDATE SET method = $2, status = $3, amount_paid = $5, due_date = $7, charge_reference = $8, charge_amount = $9, charge_phone = $10, updated_at = $11",
    )
    .bind(p.order_id).bind(p.method.as_str()).bind(p.status.as_str())
    .bind(p.amount_total.amount()).bind(p.amount_paid.amount()).bind(p.amount_total.currency())
    .bind(p.due_date).bind(charge.map(|c| c.reference.as_str()))
    .bind(charge.map(|c| c.amount.amount())).bind(charge.map(|c| c.phone_number.as_str()))
    .bind(p.updated_at)
    .execute(executor).await
    .map_err(|e| unique_violation(e, "payment reference"))?;
    Ok(())
}

async fn update_order<'e, E>(executor: E, order: &Order) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let done = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(order.id).bind(order.status.as_str()).bind(order.updated_at)
        .execute(executor).await?;
    if done.rows_affected() == 0 { return Err(StoreError::Missing("order")); }
    Ok(())
}

async fn update_rider<'e, E>(executor: E, r: &Rider) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let done = sqlx::query("UPDATE riders SET name = $2, zone = $3, is_available = $4, total_deliveries = $5, rating = $6, updated_at = $7 WHERE id = $1")
        .bind(r.id).bind(&r.name).bind(r.zone.as_str()).bind(r.is_available)
        .bind(as_i32(r.total_deliveries)?).bind(r.rating).bind(r.updated_at)
        .execute(executor).await?;
    if done.rows_affected() == 0 { return Err(StoreError::Missing("rider")); }
    Ok(())
}

async fn upsert_delivery<'e, E>(executor: E, d: &Delivery) -> StoreResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO deliveries (order_id, status, rider_id, assigned_at, delivered_at, estimated_arrival, history, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (order_id) DO UPDATE SET status = $2, rider_id = $3, assigned_at = $4, delivered_at = $5, estimated_arrival = $6, history = $7, updated_at = $8",
    )
    .bind(d.order_id).bind(d.status.as_str()).bind(d.rider_id)
    .bind(d.assigned_at).bind(d.delivered_at).bind(d.estimated_arrival)
    .bind(Json(&d.history)).bind(d.updated_at)
    .execute(executor).await?;
    Ok(())
}
