pub mod account;
pub mod inventory;
pub mod sale;
