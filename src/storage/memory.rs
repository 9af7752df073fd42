use crate::error::{LedgerError, Result};
use crate::models::{Account, InventoryItem, ItemForm, Sale, SaleForm};
use crate::storage::LedgerStorage;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Ledgers {
    items: BTreeMap<i32, InventoryItem>,
    sales: Vec<Sale>,
    last_item_id: i32,
    last_sale_id: i32,
}

impl Ledgers {
    fn first_by_name(&self, owner_id: i32, name: &str) -> Option<&InventoryItem> {
        self.items
            .values()
            .find(|item| item.owner_id == owner_id && item.name == name)
    }

    fn append_sale(&mut self, owner_id: i32, form: &SaleForm) -> Sale {
        self.last_sale_id += 1;
        let sale = Sale {
            id: self.last_sale_id,
            owner_id,
            product_name: form.product_name.clone(),
            quantity: form.quantity,
            total_price: form.total_price,
            date_sold: Utc::now(),
        };
        self.sales.push(sale.clone());
        sale
    }
}

/// In-process storage. Accounts live in a concurrent map keyed by username; both
/// ledgers sit behind a single lock so a sale is applied as one unit.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    accounts: Arc<DashMap<String, Account>>,
    last_account_id: Arc<AtomicI32>,
    ledgers: Arc<RwLock<Ledgers>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (chrono::DateTime<Utc>, i32)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn create_account(&self, username: &str, password_hash: &str) -> Result<Account> {
        match self.accounts.entry(username.to_string()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateHandle),
            Entry::Vacant(slot) => {
                let account = Account {
                    id: self.last_account_id.fetch_add(1, Ordering::SeqCst) + 1,
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                };
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>> {
        Ok(self.accounts.get(username).map(|a| a.clone()))
    }

    async fn get_account(&self, id: i32) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.value().clone()))
    }

    async fn add_item(&self, owner_id: i32, form: &ItemForm) -> Result<InventoryItem> {
        let mut ledgers = self.ledgers.write().await;
        ledgers.last_item_id += 1;
        let item = InventoryItem {
            id: ledgers.last_item_id,
            owner_id,
            name: form.name.clone(),
            quantity: form.quantity,
            price: form.price,
            low_stock_threshold: form.low_stock_threshold,
            date_added: Utc::now(),
        };
        ledgers.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: i32) -> Result<Option<InventoryItem>> {
        Ok(self.ledgers.read().await.items.get(&id).cloned())
    }

    async fn update_item(&self, owner_id: i32, id: i32, form: &ItemForm) -> Result<InventoryItem> {
        let mut ledgers = self.ledgers.write().await;
        let item = ledgers
            .items
            .get_mut(&id)
            .filter(|item| item.owner_id == owner_id)
            .ok_or(LedgerError::NotFound(id))?;
        item.name = form.name.clone();
        item.quantity = form.quantity;
        item.price = form.price;
        item.low_stock_threshold = form.low_stock_threshold;
        Ok(item.clone())
    }

    async fn delete_item(&self, owner_id: i32, id: i32) -> Result<()> {
        let mut ledgers = self.ledgers.write().await;
        match ledgers.items.get(&id) {
            Some(item) if item.owner_id == owner_id => {
                ledgers.items.remove(&id);
                Ok(())
            }
            _ => Err(LedgerError::NotFound(id)),
        }
    }

    async fn list_items(&self, owner_id: i32) -> Result<Vec<InventoryItem>> {
        let ledgers = self.ledgers.read().await;
        let mut items: Vec<_> = ledgers
            .items
            .values()
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut items, |item| (item.date_added, item.id));
        Ok(items)
    }

    async fn find_item_by_name(&self, owner_id: i32, name: &str) -> Result<Option<InventoryItem>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers.first_by_name(owner_id, name).cloned())
    }

    async fn low_stock_items(&self, owner_id: i32) -> Result<Vec<InventoryItem>> {
        let ledgers = self.ledgers.read().await;
        Ok(ledgers
            .items
            .values()
            .filter(|item| item.owner_id == owner_id && item.is_low_stock())
            .cloned()
            .collect())
    }

    async fn list_sales(&self, owner_id: i32) -> Result<Vec<Sale>> {
        let ledgers = self.ledgers.read().await;
        let mut sales: Vec<_> = ledgers
            .sales
            .iter()
            .filter(|sale| sale.owner_id == owner_id)
            .cloned()
            .collect();
        newest_first(&mut sales, |sale| (sale.date_sold, sale.id));
        Ok(sales)
    }

    async fn record_sale(&self, owner_id: i32, form: &SaleForm) -> Result<Sale> {
        let mut ledgers = self.ledgers.write().await;
        let item = ledgers
            .first_by_name(owner_id, &form.product_name)
            .ok_or_else(|| LedgerError::ProductNotFound(form.product_name.clone()))?;
        if item.quantity < form.quantity {
            return Err(LedgerError::InsufficientStock {
                product: item.name.clone(),
                available: item.quantity,
            });
        }
        let item_id = item.id;
        if let Some(item) = ledgers.items.get_mut(&item_id) {
            item.quantity -= form.quantity;
        }
        Ok(ledgers.append_sale(owner_id, form))
    }
}
