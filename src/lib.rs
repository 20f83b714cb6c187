//! # Ownership
//!
//! 賒購批次的部分所有權帳本與成本計算
//!
//! - [`model`]：批次模型、配置、錯誤類型
//! - [`store`]：帳本儲存與工作單元
//! - [`calc`]：付款分攤、出貨扣減、成本計算、銷售檢查

pub use ownership_calc as calc;
pub use ownership_core as model;
pub use ownership_store as store;

pub use ownership_calc::OwnershipLedger;
pub use ownership_core::{BucketKey, NewLot, OwnershipConfig, OwnershipError, OwnershipLot};
pub use ownership_store::InMemoryLedgerStore;
