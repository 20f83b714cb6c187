//! 所有權帳本配置

use serde::{Deserialize, Serialize};

use crate::{OwnershipError, Result};

/// 所有權帳本參數配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnershipConfig {
    /// 付款分攤金額的小數位數
    pub currency_scale: u32,

    /// 擁有量扣減歸零時的停用規則，預設立即停用
    pub close_policy: DepletionClosePolicy,

    /// 並行衝突時的最大重試次數
    pub max_commit_retries: u32,

    /// 是否為高波動商品（黃金），影響成本法建議
    pub volatile_commodity: bool,
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            currency_scale: 2,
            close_policy: DepletionClosePolicy::Immediately,
            max_commit_retries: 3,
            volatile_commodity: true,
        }
    }
}

impl OwnershipConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 JSON 文件載入配置（未提供的欄位使用預設值）
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| OwnershipError::Storage(format!("配置解析失敗: {}", e)))
    }

    /// 建構器模式：設置金額小數位數
    pub fn with_currency_scale(mut self, scale: u32) -> Self {
        self.currency_scale = scale;
        self
    }

    /// 建構器模式：設置停用規則
    pub fn with_close_policy(mut self, policy: DepletionClosePolicy) -> Self {
        self.close_policy = policy;
        self
    }

    /// 建構器模式：設置重試次數
    pub fn with_max_commit_retries(mut self, retries: u32) -> Self {
        self.max_commit_retries = retries;
        self
    }

    /// 建構器模式：設置是否為高波動商品
    pub fn with_volatile_commodity(mut self, volatile: bool) -> Self {
        self.volatile_commodity = volatile;
        self
    }
}

/// 批次停用規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepletionClosePolicy {
    /// 擁有量歸零立即停用，尚未付清的餘額不再參與付款分攤
    Immediately,
    /// 擁有量歸零且已付清才停用
    ///
    /// 適用於供應商要求付款逐批沖銷的情境：已售完但未付清的批次仍留在分組內，
    /// 後續付款會繼續分攤到它，並出現在查詢、警告與摘要中。
    WhenSettled,
}
