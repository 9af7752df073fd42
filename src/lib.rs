pub mod auth;
pub mod config;
pub mod entities;
pub mod error;
mod models;
pub mod reports;
pub mod storage;
pub mod web;

pub use error::{LedgerError, Result};
pub use models::{
    Account, ChartData, Credentials, DailySales, Dashboard, DashboardSummary, InventoryItem,
    ItemForm, Registration, Sale, SaleForm,
};

use auth::{PasswordHasher, SessionRegistry};
use chrono::{NaiveDate, Utc};
use storage::LedgerStorage;
use tracing::{info, warn};
use uuid::Uuid;

/// Per-account inventory and sales tracking on top of a [`LedgerStorage`].
///
/// Every ledger operation takes the authenticated [`Account`] explicitly and only
/// ever touches rows owned by it.
pub struct StockLedger<S: LedgerStorage> {
    storage: S,
    hasher: PasswordHasher,
    sessions: SessionRegistry,
}

impl<S: LedgerStorage> StockLedger<S> {
    pub fn new(storage: S) -> Self {
        Self::with_hasher(storage, PasswordHasher::default())
    }

    pub fn with_hasher(storage: S, hasher: PasswordHasher) -> Self {
        Self {
            storage,
            hasher,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.sessions = SessionRegistry::with_ttl(ttl);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn register(&self, registration: &Registration) -> Result<Account> {
        registration.validate()?;
        let password_hash = self.hasher.hash_blocking(&registration.password).await?;
        let account = self
            .storage
            .create_account(&registration.username, &password_hash)
            .await?;
        info!(account_id = account.id, username = %account.username, "account registered");
        Ok(account)
    }

    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Account> {
        credentials.validate()?;
        if let Some(account) = self.storage.find_account(&credentials.username).await? {
            let verified = self
                .hasher
                .verify_blocking(&credentials.password, &account.password_hash)
                .await?;
            if verified {
                return Ok(account);
            }
        }
        warn!(username = %credentials.username, "failed login");
        Err(LedgerError::InvalidCredentials)
    }

    /// Authenticates and opens a session, returning its bearer token.
    pub async fn login(&self, credentials: &Credentials) -> Result<(Uuid, Account)> {
        let account = self.authenticate(credentials).await?;
        let token = self.sessions.open(account.id);
        info!(account_id = account.id, "logged in");
        Ok((token, account))
    }

    pub fn logout(&self, token: &Uuid) -> bool {
        self.sessions.close(token)
    }

    pub async fn session_account(&self, token: &Uuid) -> Result<Account> {
        let account_id = self
            .sessions
            .resolve(token)
            .ok_or(LedgerError::Unauthenticated)?;
        self.storage
            .get_account(account_id)
            .await?
            .ok_or(LedgerError::Unauthenticated)
    }

    pub async fn add_item(&self, owner: &Account, form: &ItemForm) -> Result<InventoryItem> {
        form.validate()?;
        let item = self.storage.add_item(owner.id, form).await?;
        info!(account_id = owner.id, item_id = item.id, name = %item.name, "inventory item added");
        Ok(item)
    }

    /// Rejects an item owned by someone else before anything is written.
    async fn owned_item(&self, owner: &Account, id: i32) -> Result<InventoryItem> {
        let item = self
            .storage
            .get_item(id)
            .await?
            .ok_or(LedgerError::NotFound(id))?;
        if item.owner_id != owner.id {
            warn!(account_id = owner.id, item_id = id, "cross-account access rejected");
            return Err(LedgerError::Forbidden(id));
        }
        Ok(item)
    }

    pub async fn edit_item(&self, owner: &Account, id: i32, form: &ItemForm) -> Result<InventoryItem> {
        self.owned_item(owner, id).await?;
        form.validate()?;
        let item = self.storage.update_item(owner.id, id, form).await?;
        info!(account_id = owner.id, item_id = id, "inventory item updated");
        Ok(item)
    }

    pub async fn delete_item(&self, owner: &Account, id: i32) -> Result<()> {
        self.owned_item(owner, id).await?;
        self.storage.delete_item(owner.id, id).await?;
        info!(account_id = owner.id, item_id = id, "inventory item deleted");
        Ok(())
    }

    pub async fn inventory(&self, owner: &Account) -> Result<Vec<InventoryItem>> {
        self.storage.list_items(owner.id).await
    }

    pub async fn find_item_by_name(&self, owner: &Account, name: &str) -> Result<Option<InventoryItem>> {
        self.storage.find_item_by_name(owner.id, name).await
    }

    pub async fn low_stock(&self, owner: &Account) -> Result<Vec<InventoryItem>> {
        self.storage.low_stock_items(owner.id).await
    }

    pub async fn sales(&self, owner: &Account) -> Result<Vec<Sale>> {
        self.storage.list_sales(owner.id).await
    }

    /// Sells from the first inventory item matching the product name. The total is
    /// taken as given and is not derived from the item's unit price.
    pub async fn record_sale(&self, owner: &Account, form: &SaleForm) -> Result<Sale> {
        form.validate()?;
        match self.storage.record_sale(owner.id, form).await {
            Ok(sale) => {
                info!(
                    account_id = owner.id,
                    sale_id = sale.id,
                    product = %sale.product_name,
                    quantity = sale.quantity,
                    total = %sale.total_price,
                    "sale recorded"
                );
                Ok(sale)
            }
            Err(err) => {
                warn!(account_id = owner.id, product = %form.product_name, error = %err, "sale rejected");
                Err(err)
            }
        }
    }

    pub async fn dashboard(&self, owner: &Account) -> Result<Dashboard> {
        self.dashboard_as_of(owner, Utc::now().date_naive()).await
    }

    pub async fn dashboard_as_of(&self, owner: &Account, today: NaiveDate) -> Result<Dashboard> {
        let items = self.storage.list_items(owner.id).await?;
        let sales = self.storage.list_sales(owner.id).await?;
        Ok(Dashboard {
            summary: reports::summarize(&items, &sales)?,
            sales_trend: reports::weekly_trend(&sales, today)?,
        })
    }

    pub async fn chart_data(&self, owner: &Account) -> Result<ChartData> {
        let items = in_id_order(self.storage.list_items(owner.id).await?);
        let sales = self.storage.list_sales(owner.id).await?;
        Ok(reports::chart_data(&items, &sales))
    }

    pub async fn export_inventory(&self, owner: &Account) -> Result<Vec<u8>> {
        let items = in_id_order(self.storage.list_items(owner.id).await?);
        Ok(reports::inventory_csv(&items)?)
    }

    pub async fn export_sales(&self, owner: &Account) -> Result<Vec<u8>> {
        let mut sales = self.storage.list_sales(owner.id).await?;
        sales.sort_by_key(|sale| sale.id);
        Ok(reports::sales_csv(&sales)?)
    }
}

/// Exports and chart series list items in insertion order.
fn in_id_order(mut items: Vec<InventoryItem>) -> Vec<InventoryItem> {
    items.sort_by_key(|item| item.id);
    items
}
