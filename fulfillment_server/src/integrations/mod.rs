pub mod fx;
pub mod marketplace;
pub mod notify;
