//! Read-side aggregates and CSV exports. Everything here is a pure function over
//! rows already scoped to one owner; nothing is cached between requests.

use crate::error::{LedgerError, Result};
use crate::models::{ChartData, DailySales, DashboardSummary, InventoryItem, Sale};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

pub const TREND_DAYS: i64 = 7;

pub const INVENTORY_EXPORT_FILENAME: &str = "inventory_export.csv";
pub const SALES_EXPORT_FILENAME: &str = "sales_export.csv";

const INVENTORY_HEADER: [&str; 6] = [
    "ID",
    "Name",
    "Quantity",
    "Price",
    "Date Added",
    "Low Stock Threshold",
];
const SALES_HEADER: [&str; 5] = [
    "ID",
    "Product Name",
    "Quantity Sold",
    "Total Price",
    "Date of Sale",
];

fn add_amount(total: Decimal, amount: Decimal, what: &'static str) -> Result<Decimal> {
    total
        .checked_add(amount)
        .ok_or(LedgerError::Overflow(what))
}

pub fn summarize(items: &[InventoryItem], sales: &[Sale]) -> Result<DashboardSummary> {
    let total_revenue = sales.iter().try_fold(Decimal::ZERO, |total, sale| {
        add_amount(total, sale.total_price, "revenue")
    })?;
    Ok(DashboardSummary {
        inventory_count: items.len(),
        sales_count: sales.len(),
        total_revenue,
    })
}

/// Revenue per calendar day for the seven days ending on `today`, oldest first.
/// Days without sales report zero.
pub fn weekly_trend(sales: &[Sale], today: NaiveDate) -> Result<Vec<DailySales>> {
    let first_day = today - Duration::days(TREND_DAYS - 1);

    let mut totals: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for sale in sales {
        let day = sale.date_sold.date_naive();
        if day >= first_day && day <= today {
            let total = totals.entry(day).or_default();
            *total = add_amount(*total, sale.total_price, "daily revenue")?;
        }
    }

    Ok((0..TREND_DAYS)
        .map(|offset| {
            let date = first_day + Duration::days(offset);
            DailySales {
                label: date.format("%A").to_string(),
                date,
                total: totals.get(&date).copied().unwrap_or(Decimal::ZERO),
            }
        })
        .collect())
}

/// Inventory series follows the order of `items`; the sales series is grouped by
/// product name in name order. The two are not joined.
pub fn chart_data(items: &[InventoryItem], sales: &[Sale]) -> ChartData {
    let mut sold: BTreeMap<&str, i64> = BTreeMap::new();
    for sale in sales {
        *sold.entry(sale.product_name.as_str()).or_default() += i64::from(sale.quantity);
    }

    ChartData {
        inventory_labels: items.iter().map(|item| item.name.clone()).collect(),
        inventory_values: items.iter().map(|item| item.quantity).collect(),
        sales_labels: sold.keys().map(|name| name.to_string()).collect(),
        sales_values: sold.into_values().collect(),
    }
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

pub fn inventory_csv(items: &[InventoryItem]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv_writer();
    writer.write_record(INVENTORY_HEADER)?;
    for item in items {
        writer.write_record([
            item.id.to_string(),
            item.name.clone(),
            item.quantity.to_string(),
            item.price.to_string(),
            item.date_added.format("%Y-%m-%d").to_string(),
            item.low_stock_threshold.to_string(),
        ])?;
    }
    finish(writer)
}

pub fn sales_csv(sales: &[Sale]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv_writer();
    writer.write_record(SALES_HEADER)?;
    for sale in sales {
        writer.write_record([
            sale.id.to_string(),
            sale.product_name.clone(),
            sale.quantity.to_string(),
            sale.total_price.to_string(),
            sale.date_sold.format("%Y-%m-%d %H:%M:%S").to_string(),
        ])?;
    }
    finish(writer)
}
