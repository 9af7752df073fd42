use crate::entities::{account, inventory, sale};
use crate::error::{LedgerError, Result};
use crate::models::{Account, InventoryItem, ItemForm, Sale, SaleForm, AMOUNT_SCALE};
use crate::storage::LedgerStorage;
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectOptions,
    ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, QueryTrait, Schema, SqlErr, TransactionError,
    TransactionTrait,
};
use std::time::Duration;
use tracing::debug;

/// sea-orm backed storage for Postgres or SQLite.
#[derive(Clone)]
pub struct DatabaseStorage {
    db: DatabaseConnection,
}

impl DatabaseStorage {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut options = ConnectOptions::new(database_url);
        options
            .max_connections(max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        let db = Database::connect(options).await?;
        Self::from_connection(db).await
    }

    pub async fn from_connection(db: DatabaseConnection) -> Result<Self> {
        Self::init_database(&db).await?;
        Ok(Self { db })
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    async fn init_database(db: &DatabaseConnection) -> Result<(), DbErr> {
        let backend = db.get_database_backend();
        let schema = Schema::new(backend);

        let mut accounts = schema.create_table_from_entity(account::Entity);
        let mut items = schema.create_table_from_entity(inventory::Entity);
        let mut sales = schema.create_table_from_entity(sale::Entity);

        for statement in [
            accounts.if_not_exists(),
            items.if_not_exists(),
            sales.if_not_exists(),
        ] {
            db.execute(backend.build(&*statement)).await?;
        }
        debug!(?backend, "schema ready");
        Ok(())
    }

    /// Runs inside the sale transaction; any `Err` rolls back both writes.
    ///
    /// The guarded decrement is the first statement, so the transaction holds the
    /// write lock before it reads anything. SQLite waits for a free write lock but
    /// refuses to upgrade a read lock held inside a transaction.
    async fn apply_sale(txn: &DatabaseTransaction, owner_id: i32, form: &SaleForm) -> Result<Sale> {
        let first_match = inventory::Entity::find()
            .select_only()
            .column(inventory::Column::Id)
            .filter(inventory::Column::OwnerId.eq(owner_id))
            .filter(inventory::Column::Name.eq(form.product_name.as_str()))
            .order_by_asc(inventory::Column::Id)
            .limit(1)
            .into_query();

        let decremented = inventory::Entity::update_many()
            .col_expr(
                inventory::Column::Quantity,
                Expr::col(inventory::Column::Quantity).sub(form.quantity),
            )
            .filter(inventory::Column::Id.in_subquery(first_match))
            .filter(inventory::Column::Quantity.gte(form.quantity))
            .exec(txn)
            .await?;

        if decremented.rows_affected == 0 {
            let item = Self::first_by_name(txn, owner_id, &form.product_name)
                .await?
                .ok_or_else(|| LedgerError::ProductNotFound(form.product_name.clone()))?;
            return Err(LedgerError::InsufficientStock {
                product: item.name,
                available: item.quantity,
            });
        }

        Self::append_sale(txn, owner_id, form).await
    }

    async fn first_by_name<C: ConnectionTrait>(
        db: &C,
        owner_id: i32,
        name: &str,
    ) -> Result<Option<InventoryItem>> {
        Ok(inventory::Entity::find()
            .filter(inventory::Column::OwnerId.eq(owner_id))
            .filter(inventory::Column::Name.eq(name))
            .order_by_asc(inventory::Column::Id)
            .one(db)
            .await?
            .map(exact_item))
    }

    async fn append_sale(txn: &DatabaseTransaction, owner_id: i32, form: &SaleForm) -> Result<Sale> {
        let mut record = sale::ActiveModel::new();
        record.owner_id = Set(owner_id);
        record.product_name = Set(form.product_name.clone());
        record.quantity = Set(form.quantity);
        record.total_price = Set(form.total_price);
        Ok(exact_sale(record.insert(txn).await?))
    }
}

/// SQLite returns decimals through `f64`. Validated amounts carry at most
/// `AMOUNT_SCALE` digits, so rounding restores the stored value.
fn exact_item(mut item: InventoryItem) -> InventoryItem {
    item.price = item.price.round_dp(AMOUNT_SCALE);
    item
}

fn exact_sale(mut sale: Sale) -> Sale {
    sale.total_price = sale.total_price.round_dp(AMOUNT_SCALE);
    sale
}

#[async_trait]
impl LedgerStorage for DatabaseStorage {
    async fn create_account(&self, username: &str, password_hash: &str) -> Result<Account> {
        if self.find_account(username).await?.is_some() {
            return Err(LedgerError::DuplicateHandle);
        }
        let record = account::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash.to_string()),
            ..Default::default()
        };
        record.insert(&self.db).await.map_err(|err| {
            // A concurrent registration can still win between the check and the insert.
            match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => LedgerError::DuplicateHandle,
                _ => err.into(),
            }
        })
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>> {
        Ok(account::Entity::find()
            .filter(account::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn get_account(&self, id: i32) -> Result<Option<Account>> {
        Ok(account::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn add_item(&self, owner_id: i32, form: &ItemForm) -> Result<InventoryItem> {
        let mut record = inventory::ActiveModel::new();
        record.owner_id = Set(owner_id);
        record.name = Set(form.name.clone());
        record.quantity = Set(form.quantity);
        record.price = Set(form.price);
        record.low_stock_threshold = Set(form.low_stock_threshold);
        Ok(exact_item(record.insert(&self.db).await?))
    }

    async fn get_item(&self, id: i32) -> Result<Option<InventoryItem>> {
        Ok(inventory::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(exact_item))
    }

    async fn update_item(&self, owner_id: i32, id: i32, form: &ItemForm) -> Result<InventoryItem> {
        let item = inventory::Entity::find_by_id(id)
            .filter(inventory::Column::OwnerId.eq(owner_id))
            .one(&self.db)
            .await?
            .ok_or(LedgerError::NotFound(id))?;
        let mut record: inventory::ActiveModel = item.into();
        record.name = Set(form.name.clone());
        record.quantity = Set(form.quantity);
        record.price = Set(form.price);
        record.low_stock_threshold = Set(form.low_stock_threshold);
        Ok(exact_item(record.update(&self.db).await?))
    }

    async fn delete_item(&self, owner_id: i32, id: i32) -> Result<()> {
        let result = inventory::Entity::delete_many()
            .filter(inventory::Column::Id.eq(id))
            .filter(inventory::Column::OwnerId.eq(owner_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    async fn list_items(&self, owner_id: i32) -> Result<Vec<InventoryItem>> {
        Ok(inventory::Entity::find()
            .filter(inventory::Column::OwnerId.eq(owner_id))
            .order_by_desc(inventory::Column::DateAdded)
            .order_by_desc(inventory::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(exact_item)
            .collect())
    }

    async fn find_item_by_name(&self, owner_id: i32, name: &str) -> Result<Option<InventoryItem>> {
        Self::first_by_name(&self.db, owner_id, name).await
    }

    async fn low_stock_items(&self, owner_id: i32) -> Result<Vec<InventoryItem>> {
        Ok(inventory::Entity::find()
            .filter(inventory::Column::OwnerId.eq(owner_id))
            .filter(
                Expr::col(inventory::Column::Quantity)
                    .lte(Expr::col(inventory::Column::LowStockThreshold)),
            )
            .order_by_asc(inventory::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(exact_item)
            .collect())
    }

    async fn list_sales(&self, owner_id: i32) -> Result<Vec<Sale>> {
        Ok(sale::Entity::find()
            .filter(sale::Column::OwnerId.eq(owner_id))
            .order_by_desc(sale::Column::DateSold)
            .order_by_desc(sale::Column::Id)
            .all(&self.db)
            .await?
            .into_iter()
            .map(exact_sale)
            .collect())
    }

    async fn record_sale(&self, owner_id: i32, form: &SaleForm) -> Result<Sale> {
        let form = form.clone();
        self.db
            .transaction::<_, Sale, LedgerError>(move |txn| {
                Box::pin(async move { Self::apply_sale(txn, owner_id, &form).await })
            })
            .await
            .map_err(|err| match err {
                TransactionError::Connection(err) => err.into(),
                TransactionError::Transaction(err) => err,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup_test_db() -> Result<DatabaseStorage> {
        DatabaseStorage::connect("sqlite::memory:", 1).await
    }

    async fn setup_file_db(dir: &TempDir) -> Result<DatabaseStorage> {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display());
        DatabaseStorage::connect(&url, 4).await
    }

    async fn seed_owner(storage: &DatabaseStorage, username: &str) -> Result<Account> {
        storage.create_account(username, "hash").await
    }

    #[tokio::test]
    async fn test_account_roundtrip_and_duplicates() -> Result<()> {
        let storage = setup_test_db().await?;
        let alice = seed_owner(&storage, "alice").await?;
        assert_eq!(storage.get_account(alice.id).await?, Some(alice.clone()));
        assert_eq!(storage.find_account("alice").await?, Some(alice));
        assert!(storage.find_account("ALICE").await?.is_none());
        assert!(matches!(
            storage.create_account("alice", "x").await,
            Err(LedgerError::DuplicateHandle)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_crud_operations() -> Result<()> {
        let storage = setup_test_db().await?;
        let owner = seed_owner(&storage, "owner").await?;

        let item = storage
            .add_item(owner.id, &ItemForm::new("Widget", 10, Decimal::new(250, 2)))
            .await?;
        assert_eq!(item.low_stock_threshold, 5);

        let updated = storage
            .update_item(
                owner.id,
                item.id,
                &ItemForm::new("Widget XL", 4, Decimal::new(300, 2)).with_threshold(2),
            )
            .await?;
        assert_eq!(updated.name, "Widget XL");
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.date_added, item.date_added);

        storage.delete_item(owner.id, item.id).await?;
        assert!(storage.get_item(item.id).await?.is_none());
        assert!(matches!(
            storage.delete_item(owner.id, item.id).await,
            Err(LedgerError::NotFound(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_is_owner_scoped() -> Result<()> {
        let storage = setup_test_db().await?;
        let alice = seed_owner(&storage, "alice").await?;
        let bob = seed_owner(&storage, "bob").await?;

        let at_threshold = storage
            .add_item(alice.id, &ItemForm::new("Nails", 5, Decimal::ONE))
            .await?;
        storage
            .add_item(alice.id, &ItemForm::new("Screws", 6, Decimal::ONE))
            .await?;
        storage
            .add_item(bob.id, &ItemForm::new("Glue", 0, Decimal::ONE))
            .await?;

        let low = storage.low_stock_items(alice.id).await?;
        assert_eq!(low, vec![at_threshold]);
        Ok(())
    }

    #[tokio::test]
    async fn test_record_sale_commits_both_writes() -> Result<()> {
        let storage = setup_test_db().await?;
        let owner = seed_owner(&storage, "owner").await?;
        let item = storage
            .add_item(owner.id, &ItemForm::new("Widget", 10, Decimal::new(250, 2)))
            .await?;

        let sale = storage
            .record_sale(owner.id, &SaleForm::new("Widget", 3, Decimal::new(750, 2)))
            .await?;
        assert_eq!(sale.quantity, 3);
        assert_eq!(sale.total_price, Decimal::new(750, 2));
        assert_eq!(storage.get_item(item.id).await?.unwrap().quantity, 7);

        let result = storage
            .record_sale(owner.id, &SaleForm::new("Widget", 8, Decimal::new(2000, 2)))
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientStock { available: 7, .. })
        ));
        assert_eq!(storage.get_item(item.id).await?.unwrap().quantity, 7);
        assert_eq!(storage.list_sales(owner.id).await?.len(), 1);

        let result = storage
            .record_sale(owner.id, &SaleForm::new("Gizmo", 1, Decimal::ONE))
            .await;
        assert!(matches!(result, Err(LedgerError::ProductNotFound(_))));
        assert_eq!(storage.list_sales(owner.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_sale_insert_rolls_back_decrement() -> Result<()> {
        let storage = setup_test_db().await?;
        let owner = seed_owner(&storage, "owner").await?;
        let item = storage
            .add_item(owner.id, &ItemForm::new("Widget", 10, Decimal::ONE))
            .await?;

        storage
            .connection()
            .execute_unprepared("DROP TABLE sales")
            .await?;

        let result = storage
            .record_sale(owner.id, &SaleForm::new("Widget", 4, Decimal::new(400, 2)))
            .await;
        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_eq!(storage.get_item(item.id).await?.unwrap().quantity, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_amounts_survive_storage_exactly() -> Result<()> {
        let storage = setup_test_db().await?;
        let owner = seed_owner(&storage, "owner").await?;

        for price in [
            Decimal::new(99_999_999_999, 2),
            Decimal::new(1_234_567_89, 2),
            Decimal::new(7, 2),
            Decimal::new(30, 1),
        ] {
            let item = storage
                .add_item(owner.id, &ItemForm::new(format!("Item {price}"), 1, price))
                .await?;
            assert_eq!(item.price, price);
            assert_eq!(storage.get_item(item.id).await?.unwrap().price, price);

            let sale = storage
                .record_sale(owner.id, &SaleForm::new(item.name.clone(), 1, price))
                .await?;
            assert_eq!(sale.total_price, price);
        }

        let sales = storage.list_sales(owner.id).await?;
        assert_eq!(sales[0].total_price, Decimal::new(30, 1));
        assert_eq!(sales[3].total_price, Decimal::new(99_999_999_999, 2));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_sales_newest_first() -> Result<()> {
        let storage = setup_test_db().await?;
        let owner = seed_owner(&storage, "owner").await?;
        let other = seed_owner(&storage, "other").await?;
        storage
            .add_item(owner.id, &ItemForm::new("Widget", 10, Decimal::ONE))
            .await?;
        storage
            .add_item(other.id, &ItemForm::new("Widget", 10, Decimal::ONE))
            .await?;

        for quantity in 1..=3 {
            storage
                .record_sale(owner.id, &SaleForm::new("Widget", quantity, Decimal::ONE))
                .await?;
        }
        storage
            .record_sale(other.id, &SaleForm::new("Widget", 1, Decimal::ONE))
            .await?;

        let quantities: Vec<_> = storage
            .list_sales(owner.id)
            .await?
            .iter()
            .map(|sale| sale.quantity)
            .collect();
        assert_eq!(quantities, [3, 2, 1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() -> Result<()> {
        let dir = TempDir::new().map_err(|e| DbErr::Custom(e.to_string()))?;
        let storage = Arc::new(setup_file_db(&dir).await?);
        let owner = seed_owner(&storage, "owner").await?;
        let item = storage
            .add_item(owner.id, &ItemForm::new("Widget", 5, Decimal::ONE))
            .await?;

        let attempts = (0..8).map(|_| {
            let storage = Arc::clone(&storage);
            let owner_id = owner.id;
            tokio::spawn(async move {
                storage
                    .record_sale(owner_id, &SaleForm::new("Widget", 2, Decimal::TWO))
                    .await
            })
        });
        let results = join_all(attempts).await;

        let mut succeeded = 0;
        for result in results {
            match result.expect("task panicked") {
                Ok(_) => succeeded += 1,
                Err(LedgerError::InsufficientStock { available: 1, .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(succeeded, 2);
        assert_eq!(storage.get_item(item.id).await?.unwrap().quantity, 1);
        assert_eq!(storage.list_sales(owner.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_sales_across_owners_all_commit() -> Result<()> {
        let dir = TempDir::new().map_err(|e| DbErr::Custom(e.to_string()))?;
        let storage = Arc::new(setup_file_db(&dir).await?);

        let mut owners = Vec::new();
        for n in 0..8 {
            let owner = seed_owner(&storage, &format!("owner{n}")).await?;
            storage
                .add_item(owner.id, &ItemForm::new("Widget", 100, Decimal::ONE))
                .await?;
            owners.push(owner.id);
        }

        let attempts = owners.iter().map(|&owner_id| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move {
                storage
                    .record_sale(owner_id, &SaleForm::new("Widget", 1, Decimal::ONE))
                    .await
            })
        });
        for result in join_all(attempts).await {
            result.expect("task panicked")?;
        }

        for owner_id in owners {
            let item = storage.find_item_by_name(owner_id, "Widget").await?.unwrap();
            assert_eq!(item.quantity, 99);
            assert_eq!(storage.list_sales(owner_id).await?.len(), 1);
        }
        Ok(())
    }
}
