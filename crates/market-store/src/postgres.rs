use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CategoryId, ItemId, TransactionEvidenceId, UserId};
use domain::{
    DomainError, Item, ItemSnapshot, ItemStatus, NewItem, NewTransactionEvidence, NewUser, Price,
    Shipping, TransactionEvidence, TransactionEvidenceStatus, User,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{MarketStore, StoreTx},
};

const USER_COLUMNS: &str = "id, account_name, address, num_sell_items, last_bump, created_at";

const ITEM_COLUMNS: &str = "id, seller_id, buyer_id, status, name, price, description, \
     image_name, category_id, created_at, updated_at";

const EVIDENCE_COLUMNS: &str = "id, seller_id, buyer_id, status, item_id, item_name, item_price, \
     item_description, item_category_id, item_root_category_id, created_at, updated_at";

const SHIPPING_COLUMNS: &str = "transaction_evidence_id, status, item_name, item_id, reserve_id, \
     reserve_time, to_address, to_name, from_address, from_name, img_binary, created_at, \
     updated_at";

fn corrupt(table: &'static str) -> impl FnOnce(DomainError) -> StoreError {
    move |source| StoreError::Corrupt { table, source }
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        account_name: row.try_get("account_name")?,
        address: row.try_get("address")?,
        num_sell_items: row.try_get("num_sell_items")?,
        last_bump: row.try_get("last_bump")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_item(row: PgRow) -> Result<Item> {
    let buyer_id: i64 = row.try_get("buyer_id")?;
    let status: String = row.try_get("status")?;
    let price: i32 = row.try_get("price")?;

    Ok(Item {
        id: ItemId::new(row.try_get("id")?),
        seller_id: UserId::new(row.try_get("seller_id")?),
        buyer_id: (buyer_id != 0).then_some(UserId::new(buyer_id)),
        status: status.parse::<ItemStatus>().map_err(corrupt("items"))?,
        name: row.try_get("name")?,
        price: Price::new(price.into()).map_err(corrupt("items"))?,
        description: row.try_get("description")?,
        image_name: row.try_get("image_name")?,
        category_id: CategoryId::new(row.try_get("category_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_evidence(row: PgRow) -> Result<TransactionEvidence> {
    let status: String = row.try_get("status")?;
    let price: i32 = row.try_get("item_price")?;

    let item = ItemSnapshot::from_parts(
        row.try_get("item_name")?,
        Price::new(price.into()).map_err(corrupt("transaction_evidences"))?,
        row.try_get("item_description")?,
        CategoryId::new(row.try_get("item_category_id")?),
        CategoryId::new(row.try_get("item_root_category_id")?),
    );

    Ok(TransactionEvidence {
        id: TransactionEvidenceId::new(row.try_get("id")?),
        seller_id: UserId::new(row.try_get("seller_id")?),
        buyer_id: UserId::new(row.try_get("buyer_id")?),
        status: status
            .parse::<TransactionEvidenceStatus>()
            .map_err(corrupt("transaction_evidences"))?,
        item_id: ItemId::new(row.try_get("item_id")?),
        item,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_shipping(row: PgRow) -> Result<Shipping> {
    let status: String = row.try_get("status")?;

    Ok(Shipping {
        transaction_evidence_id: TransactionEvidenceId::new(row.try_get("transaction_evidence_id")?),
        status: status.parse().map_err(corrupt("shippings"))?,
        item_id: ItemId::new(row.try_get("item_id")?),
        item_name: row.try_get("item_name")?,
        reserve_id: row.try_get("reserve_id")?,
        reserve_time: row.try_get("reserve_time")?,
        to_address: row.try_get("to_address")?,
        to_name: row.try_get("to_name")?,
        from_address: row.try_get("from_address")?,
        from_name: row.try_get("from_name")?,
        label: row.try_get("img_binary")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn unique_violation(err: sqlx::Error, constraint: &str, message: String) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.constraint() == Some(constraint)
    {
        return StoreError::Conflict(message);
    }
    StoreError::Database(err)
}

fn ensure_written(rows: u64, entity: &'static str, id: impl ToString) -> Result<()> {
    if rows == 0 {
        return Err(StoreError::RowNotFound {
            entity,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// PostgreSQL-backed market store.
#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
}

impl PgMarketStore {
    /// Creates a new PostgreSQL market store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MarketStore for PgMarketStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PgStoreTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_user).transpose()
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_item).transpose()
    }

    async fn get_transaction_evidence(
        &self,
        id: TransactionEvidenceId,
    ) -> Result<Option<TransactionEvidence>> {
        let row = sqlx::query(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM transaction_evidences WHERE id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_evidence).transpose()
    }

    async fn find_transaction_evidence_by_item(
        &self,
        item_id: ItemId,
    ) -> Result<Option<TransactionEvidence>> {
        let row = sqlx::query(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM transaction_evidences WHERE item_id = $1"
        ))
        .bind(item_id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_evidence).transpose()
    }

    async fn get_shipping(&self, id: TransactionEvidenceId) -> Result<Option<Shipping>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shippings WHERE transaction_evidence_id = $1"
        ))
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_shipping).transpose()
    }

    async fn insert_user(&self, user: NewUser, now: DateTime<Utc>) -> Result<User> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (account_name, address, num_sell_items, last_bump, created_at)
            VALUES ($1, $2, 0, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.account_name)
        .bind(&user.address)
        .bind(DateTime::<Utc>::UNIX_EPOCH)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                "unique_account_name",
                format!("account name {} is taken", user.account_name),
            )
        })?;
        row_to_user(row)
    }
}

/// Unit of work over [`PgMarketStore`]. Row locks are `SELECT … FOR UPDATE`.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_user).transpose()
    }

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_item).transpose()
    }

    async fn lock_transaction_evidence(
        &mut self,
        id: TransactionEvidenceId,
    ) -> Result<Option<TransactionEvidence>> {
        let row = sqlx::query(&format!(
            "SELECT {EVIDENCE_COLUMNS} FROM transaction_evidences WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_evidence).transpose()
    }

    async fn lock_shipping(&mut self, id: TransactionEvidenceId) -> Result<Option<Shipping>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPPING_COLUMNS} FROM shippings WHERE transaction_evidence_id = $1 FOR UPDATE"
        ))
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(row_to_shipping).transpose()
    }

    async fn insert_item(&mut self, item: NewItem, now: DateTime<Utc>) -> Result<Item> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO items
                (seller_id, buyer_id, status, name, price, description, image_name,
                 category_id, created_at, updated_at)
            VALUES ($1, 0, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item.seller_id.get())
        .bind(ItemStatus::OnSale.as_str())
        .bind(&item.name)
        .bind(item.price.get())
        .bind(&item.description)
        .bind(&item.image_name)
        .bind(item.category.id.get())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        row_to_item(row)
    }

    async fn insert_transaction_evidence(
        &mut self,
        evidence: NewTransactionEvidence,
        now: DateTime<Utc>,
    ) -> Result<TransactionEvidence> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO transaction_evidences
                (seller_id, buyer_id, status, item_id, item_name, item_price, item_description,
                 item_category_id, item_root_category_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {EVIDENCE_COLUMNS}
            "#
        ))
        .bind(evidence.seller_id.get())
        .bind(evidence.buyer_id.get())
        .bind(TransactionEvidenceStatus::WaitShipping.as_str())
        .bind(evidence.item_id.get())
        .bind(evidence.item.name())
        .bind(evidence.item.price().get())
        .bind(evidence.item.description())
        .bind(evidence.item.category_id().get())
        .bind(evidence.item.root_category_id().get())
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                "unique_evidence_item",
                format!(
                    "item {} already has a transaction evidence",
                    evidence.item_id
                ),
            )
        })?;
        row_to_evidence(row)
    }

    async fn insert_shipping(&mut self, shipping: &Shipping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO shippings
                (transaction_evidence_id, status, item_name, item_id, reserve_id, reserve_time,
                 to_address, to_name, from_address, from_name, img_binary, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(shipping.transaction_evidence_id.get())
        .bind(shipping.status.as_str())
        .bind(&shipping.item_name)
        .bind(shipping.item_id.get())
        .bind(&shipping.reserve_id)
        .bind(shipping.reserve_time)
        .bind(&shipping.to_address)
        .bind(&shipping.to_name)
        .bind(&shipping.from_address)
        .bind(&shipping.from_name)
        .bind(&shipping.label)
        .bind(shipping.created_at)
        .bind(shipping.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            unique_violation(
                e,
                "shippings_pkey",
                format!(
                    "shipping for transaction evidence {} already exists",
                    shipping.transaction_evidence_id
                ),
            )
        })?;
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET address = $2, num_sell_items = $3, last_bump = $4 WHERE id = $1",
        )
        .bind(user.id.get())
        .bind(&user.address)
        .bind(user.num_sell_items)
        .bind(user.last_bump)
        .execute(&mut *self.tx)
        .await?;
        ensure_written(result.rows_affected(), "user", user.id)
    }

    async fn update_item(&mut self, item: &Item) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE items
            SET buyer_id = $2, status = $3, price = $4, created_at = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(item.id.get())
        .bind(item.buyer_id.map(|id| id.get()).unwrap_or(0))
        .bind(item.status.as_str())
        .bind(item.price.get())
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await?;
        ensure_written(result.rows_affected(), "item", item.id)
    }

    async fn update_transaction_evidence(&mut self, evidence: &TransactionEvidence) -> Result<()> {
        let result = sqlx::query(
            "UPDATE transaction_evidences SET status = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(evidence.id.get())
        .bind(evidence.status.as_str())
        .bind(evidence.updated_at)
        .execute(&mut *self.tx)
        .await?;
        ensure_written(result.rows_affected(), "transaction evidence", evidence.id)
    }

    async fn update_shipping(&mut self, shipping: &Shipping) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE shippings
            SET status = $2, img_binary = $3, updated_at = $4
            WHERE transaction_evidence_id = $1
            "#,
        )
        .bind(shipping.transaction_evidence_id.get())
        .bind(shipping.status.as_str())
        .bind(&shipping.label)
        .bind(shipping.updated_at)
        .execute(&mut *self.tx)
        .await?;
        ensure_written(
            result.rows_affected(),
            "shipping",
            shipping.transaction_evidence_id,
        )
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
