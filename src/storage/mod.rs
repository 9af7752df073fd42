use crate::error::Result;
use crate::models::{Account, InventoryItem, ItemForm, Sale, SaleForm};
use async_trait::async_trait;

/// Persistence for accounts and their inventory and sales ledgers.
///
/// Every ledger operation takes the owning account id explicitly; implementations
/// never return rows belonging to another owner from an owner-scoped call.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Fails with `DuplicateHandle` when the username is taken.
    async fn create_account(&self, username: &str, password_hash: &str) -> Result<Account>;
    async fn find_account(&self, username: &str) -> Result<Option<Account>>;
    async fn get_account(&self, id: i32) -> Result<Option<Account>>;

    async fn add_item(&self, owner_id: i32, form: &ItemForm) -> Result<InventoryItem>;
    /// Unscoped lookup, used to tell a missing item apart from another owner's item.
    async fn get_item(&self, id: i32) -> Result<Option<InventoryItem>>;
    async fn update_item(&self, owner_id: i32, id: i32, form: &ItemForm) -> Result<InventoryItem>;
    async fn delete_item(&self, owner_id: i32, id: i32) -> Result<()>;
    /// Newest-added first.
    async fn list_items(&self, owner_id: i32) -> Result<Vec<InventoryItem>>;
    /// First match by lowest id when several items share a name.
    async fn find_item_by_name(&self, owner_id: i32, name: &str) -> Result<Option<InventoryItem>>;
    async fn low_stock_items(&self, owner_id: i32) -> Result<Vec<InventoryItem>>;

    /// Newest first.
    async fn list_sales(&self, owner_id: i32) -> Result<Vec<Sale>>;

    /// Checks availability, decrements the named item and appends the sale as one
    /// atomic unit. On any error neither write is visible.
    async fn record_sale(&self, owner_id: i32, sale: &SaleForm) -> Result<Sale>;
}

pub mod database;
pub mod memory;
