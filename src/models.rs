pub use crate::entities::account::Model as Account;
pub use crate::entities::inventory::Model as InventoryItem;
pub use crate::entities::sale::Model as Sale;

use crate::entities::inventory::DEFAULT_LOW_STOCK_THRESHOLD;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const USERNAME_MIN_LEN: usize = 2;
const USERNAME_MAX_LEN: usize = 20;

/// Largest price or sale total accepted.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);
/// Fractional digits kept for prices and totals.
pub const AMOUNT_SCALE: u32 = 2;

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{field} is required")));
    }
    Ok(())
}

/// Money fields are bounded so they stay exact through every backend and any
/// realistic sum of them fits in a `Decimal`.
fn amount(field: &str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(LedgerError::validation(format!("{field} must be at least 0")));
    }
    if value > MAX_AMOUNT {
        return Err(LedgerError::validation(format!(
            "{field} must be at most {MAX_AMOUNT}"
        )));
    }
    if value.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::validation(format!(
            "{field} can have at most {AMOUNT_SCALE} decimal places"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        required("Username", &self.username)?;
        let len = self.username.chars().count();
        if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
            return Err(LedgerError::validation(format!(
                "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters long"
            )));
        }
        required("Password", &self.password)?;
        if self.password != self.confirm_password {
            return Err(LedgerError::validation("Passwords must match"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn validate(&self) -> Result<()> {
        required("Username", &self.username)?;
        required("Password", &self.password)
    }
}

fn default_threshold() -> i32 {
    DEFAULT_LOW_STOCK_THRESHOLD
}

/// Fields accepted when adding or editing an inventory item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemForm {
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    #[serde(default = "default_threshold")]
    pub low_stock_threshold: i32,
}

impl ItemForm {
    pub fn new(name: impl Into<String>, quantity: i32, price: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            price,
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: i32) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        required("Item Name", &self.name)?;
        if self.quantity < 0 {
            return Err(LedgerError::validation("Quantity must be at least 0"));
        }
        amount("Price", self.price)?;
        if self.low_stock_threshold < 0 {
            return Err(LedgerError::validation(
                "Low Stock Threshold must be at least 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaleForm {
    pub product_name: String,
    pub quantity: i32,
    pub total_price: Decimal,
}

impl SaleForm {
    pub fn new(product_name: impl Into<String>, quantity: i32, total_price: Decimal) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
            total_price,
        }
    }

    pub fn validate(&self) -> Result<()> {
        required("Product Name", &self.product_name)?;
        if self.quantity < 1 {
            return Err(LedgerError::validation("Quantity must be at least 1"));
        }
        amount("Total Price", self.total_price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub inventory_count: usize,
    pub sales_count: usize,
    pub total_revenue: Decimal,
}

/// Revenue for a single calendar day of the weekly trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub label: String,
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    #[serde(flatten)]
    pub summary: DashboardSummary,
    pub sales_trend: Vec<DailySales>,
}

/// Two independent series: current stock per item and units sold per product name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub inventory_labels: Vec<String>,
    pub inventory_values: Vec<i32>,
    pub sales_labels: Vec<String>,
    pub sales_values: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(username: &str, password: &str, confirm: &str) -> Registration {
        Registration {
            username: username.to_string(),
            password: password.to_string(),
            confirm_password: confirm.to_string(),
        }
    }

    #[test]
    fn test_registration_rules() {
        assert!(registration("alice", "secret", "secret").validate().is_ok());
        assert!(registration("a", "secret", "secret").validate().is_err());
        assert!(registration(&"x".repeat(21), "secret", "secret")
            .validate()
            .is_err());
        assert!(registration("alice", "", "").validate().is_err());
        assert!(registration("alice", "secret", "secrets").validate().is_err());
    }

    #[test]
    fn test_item_form_rejects_negative_values() {
        let form = ItemForm::new("Widget", 10, Decimal::new(250, 2));
        assert!(form.validate().is_ok());
        assert_eq!(form.low_stock_threshold, 5);

        assert!(ItemForm::new("Widget", -1, Decimal::ONE).validate().is_err());
        assert!(ItemForm::new("Widget", 1, Decimal::new(-1, 2))
            .validate()
            .is_err());
        assert!(ItemForm::new("Widget", 1, Decimal::ONE)
            .with_threshold(-3)
            .validate()
            .is_err());
        assert!(ItemForm::new("   ", 1, Decimal::ONE).validate().is_err());
    }

    #[test]
    fn test_item_form_threshold_defaults_when_missing() {
        let form: ItemForm =
            serde_json::from_str(r#"{"name":"Bolt","quantity":3,"price":"1.25"}"#).unwrap();
        assert_eq!(form.low_stock_threshold, DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(form.price, Decimal::new(125, 2));
    }

    #[test]
    fn test_sale_form_rules() {
        assert!(SaleForm::new("Widget", 1, Decimal::ZERO).validate().is_ok());
        assert!(SaleForm::new("Widget", 0, Decimal::ONE).validate().is_err());
        assert!(SaleForm::new("", 1, Decimal::ONE).validate().is_err());
        assert!(SaleForm::new("Widget", 1, Decimal::new(-5, 1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_amounts_are_bounded() {
        assert!(ItemForm::new("Widget", 1, MAX_AMOUNT).validate().is_ok());
        assert!(ItemForm::new("Widget", 1, Decimal::new(250_000, 5))
            .validate()
            .is_ok());
        assert!(ItemForm::new("Widget", 1, MAX_AMOUNT + Decimal::new(1, 2))
            .validate()
            .is_err());
        assert!(ItemForm::new("Widget", 1, Decimal::new(1_005, 3))
            .validate()
            .is_err());

        assert!(SaleForm::new("Widget", 1, MAX_AMOUNT).validate().is_ok());
        assert!(matches!(
            SaleForm::new("Widget", 1, Decimal::MAX).validate(),
            Err(LedgerError::Validation(_))
        ));
        assert!(SaleForm::new("Widget", 1, Decimal::new(12_345, 4))
            .validate()
            .is_err());
    }
}
