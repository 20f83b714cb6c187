//! 所有權批次模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use crate::{BucketKey, OwnershipError, Result};

/// 批次ID
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(Uuid);

impl LotId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 批次類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotKind {
    /// 成品（件數與重量皆有意義）
    Product,
    /// 原料（僅重量有意義，付款只更新擁有重量）
    RawMaterial,
}

/// 計量方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Measure {
    /// 件數
    Quantity,
    /// 重量
    Weight,
}

impl Measure {
    /// 批次在此計量下的擁有量
    pub fn owned(self, lot: &OwnershipLot) -> Decimal {
        match self {
            Measure::Quantity => lot.owned_quantity,
            Measure::Weight => lot.owned_weight,
        }
    }

    /// 批次在此計量下的整批量
    pub fn total(self, lot: &OwnershipLot) -> Decimal {
        match self {
            Measure::Quantity => lot.total_quantity,
            Measure::Weight => lot.total_weight,
        }
    }

    /// 有效且在此計量下仍有擁有量
    pub fn has_owned(self, lot: &OwnershipLot) -> bool {
        lot.is_active && self.owned(lot) > Decimal::ZERO
    }
}

/// 付款狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// 完全未付款
    Unpaid,
    /// 部分付款
    PartiallyPaid,
    /// 已付清
    FullyPaid,
}

/// 進貨時建立批次的請求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLot {
    pub bucket: BucketKey,
    pub kind: LotKind,
    pub total_quantity: Decimal,
    pub total_weight: Decimal,
    pub total_cost: Decimal,
    /// 來源單據（進貨單號）
    pub source_reference: String,
    pub created_at: DateTime<Utc>,
    /// 自有/系統庫存，建立時即完全擁有
    pub initially_fully_owned: bool,
}

impl NewLot {
    /// 創建新的進貨請求（數量、重量、成本預設為 0）
    pub fn new(
        bucket: BucketKey,
        kind: LotKind,
        source_reference: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bucket,
            kind,
            total_quantity: Decimal::ZERO,
            total_weight: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            source_reference: source_reference.into(),
            created_at,
            initially_fully_owned: false,
        }
    }

    /// 建構器模式：設置數量
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.total_quantity = quantity;
        self
    }

    /// 建構器模式：設置重量
    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.total_weight = weight;
        self
    }

    /// 建構器模式：設置成本
    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.total_cost = cost;
        self
    }

    /// 建構器模式：標記為自有庫存
    pub fn fully_owned(mut self) -> Self {
        self.initially_fully_owned = true;
        self
    }

    /// 驗證請求
    pub fn validate(&self) -> Result<()> {
        if self.total_quantity < Decimal::ZERO
            || self.total_weight < Decimal::ZERO
            || self.total_cost < Decimal::ZERO
        {
            return Err(OwnershipError::InvalidLot(format!(
                "{} 的數量、重量、成本不可為負數",
                self.source_reference
            )));
        }
        if self.total_quantity.is_zero() && self.total_weight.is_zero() {
            return Err(OwnershipError::InvalidLot(format!(
                "{} 的數量與重量不可同時為 0",
                self.source_reference
            )));
        }
        Ok(())
    }
}

/// 所有權批次
///
/// `ownership_percentage` 追蹤付款進度，`owned_quantity` 追蹤剩餘可主張的庫存，
/// 兩者各自演變：付款只推進前者並增加擁有量，出貨只扣減後者。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipLot {
    pub id: LotId,
    pub bucket: BucketKey,
    pub kind: LotKind,
    pub source_reference: String,

    pub total_quantity: Decimal,
    pub total_weight: Decimal,
    pub total_cost: Decimal,

    pub amount_paid: Decimal,
    pub outstanding_amount: Decimal,

    /// 已付比例，介於 [0, 1]（不是 0-100）
    pub ownership_percentage: Decimal,

    pub owned_quantity: Decimal,
    pub owned_weight: Decimal,

    /// 累計已出貨/消耗量
    pub consumed_quantity: Decimal,
    pub consumed_weight: Decimal,

    /// FIFO/LIFO 排序依據
    pub created_at: DateTime<Utc>,

    /// 寫入順序，created_at 相同時用來決定先後
    pub sequence: u64,

    pub is_active: bool,
}

impl OwnershipLot {
    /// 由進貨請求建立批次
    ///
    /// 自有庫存或零成本批次直接視為完全擁有，其餘從 0% 開始。
    pub fn from_receipt(request: NewLot, sequence: u64) -> Result<Self> {
        request.validate()?;

        let fully_owned = request.initially_fully_owned || request.total_cost.is_zero();
        let (amount_paid, pct, owned_quantity, owned_weight) = if fully_owned {
            (
                request.total_cost,
                Decimal::ONE,
                request.total_quantity,
                request.total_weight,
            )
        } else {
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
        };

        Ok(Self {
            id: LotId::new(),
            bucket: request.bucket,
            kind: request.kind,
            source_reference: request.source_reference,
            total_quantity: request.total_quantity,
            total_weight: request.total_weight,
            total_cost: request.total_cost,
            amount_paid,
            outstanding_amount: request.total_cost - amount_paid,
            ownership_percentage: pct,
            owned_quantity,
            owned_weight,
            consumed_quantity: Decimal::ZERO,
            consumed_weight: Decimal::ZERO,
            created_at: request.created_at,
            sequence,
            is_active: true,
        })
    }

    /// 估值計量：原料或沒有件數的批次按重量，其餘按件數
    pub fn valuation_measure(&self) -> Measure {
        if self.kind == LotKind::RawMaterial || self.total_quantity.is_zero() {
            Measure::Weight
        } else {
            Measure::Quantity
        }
    }

    /// 單位成本（整批成本 / 整批數量或重量）
    pub fn unit_cost(&self, measure: Measure) -> Option<Decimal> {
        let total = measure.total(self);
        if total.is_zero() {
            None
        } else {
            Some(self.total_cost / total)
        }
    }

    /// 擁有部分對應的成本，依估值計量的擁有比例計算
    pub fn owned_cost_share(&self) -> Decimal {
        let measure = self.valuation_measure();
        let total = measure.total(self);
        if total.is_zero() {
            Decimal::ZERO
        } else {
            self.total_cost * measure.owned(self) / total
        }
    }

    /// 是否還有可估值的擁有庫存
    pub fn has_owned_stock(&self) -> bool {
        self.valuation_measure().has_owned(self)
    }

    /// 付款狀態
    pub fn payment_status(&self) -> PaymentStatus {
        if self.outstanding_amount.is_zero() {
            PaymentStatus::FullyPaid
        } else if self.amount_paid.is_zero() {
            PaymentStatus::Unpaid
        } else {
            PaymentStatus::PartiallyPaid
        }
    }

    pub fn is_fully_owned(&self) -> bool {
        self.ownership_percentage == Decimal::ONE
    }

    /// 是否還有未付款
    pub fn has_outstanding(&self) -> bool {
        self.is_active && self.outstanding_amount > Decimal::ZERO
    }

    /// 記入一筆付款分攤，回傳新增的 (擁有數量, 擁有重量)
    ///
    /// 擁有量 = 整批 × 已付比例 − 累計消耗，已出貨的部分不會被重新計入。
    /// 原料批次只更新擁有重量。
    pub fn apply_payment(&mut self, share: Decimal) -> (Decimal, Decimal) {
        self.amount_paid += share;
        self.outstanding_amount -= share;
        self.ownership_percentage = if self.outstanding_amount.is_zero() {
            Decimal::ONE
        } else {
            (self.amount_paid / self.total_cost).min(Decimal::ONE)
        };

        let gained_weight = Self::regrow(
            &mut self.owned_weight,
            self.total_weight,
            self.consumed_weight,
            self.ownership_percentage,
        );
        let gained_quantity = match self.kind {
            LotKind::Product => Self::regrow(
                &mut self.owned_quantity,
                self.total_quantity,
                self.consumed_quantity,
                self.ownership_percentage,
            ),
            LotKind::RawMaterial => Decimal::ZERO,
        };

        (gained_quantity, gained_weight)
    }

    fn regrow(owned: &mut Decimal, total: Decimal, consumed: Decimal, pct: Decimal) -> Decimal {
        let before = *owned;
        let target = (total * pct - consumed).max(Decimal::ZERO).min(total - consumed);
        *owned = target.max(before);
        *owned - before
    }

    /// 扣減擁有數量，重量按比例扣減；回傳扣減的重量
    ///
    /// 呼叫端需確保 `quantity <= owned_quantity`。
    pub fn take_quantity(&mut self, quantity: Decimal) -> Decimal {
        let weight = if quantity >= self.owned_quantity {
            self.owned_weight
        } else {
            (quantity * self.owned_weight / self.owned_quantity).min(self.owned_weight)
        };
        let quantity = quantity.min(self.owned_quantity);

        self.owned_quantity -= quantity;
        self.owned_weight -= weight;
        self.consumed_quantity += quantity;
        self.consumed_weight += weight;
        weight
    }

    /// 扣減擁有重量，數量按比例扣減；回傳扣減的數量
    ///
    /// 呼叫端需確保 `weight <= owned_weight`。
    pub fn take_weight(&mut self, weight: Decimal) -> Decimal {
        let quantity = if weight >= self.owned_weight {
            self.owned_quantity
        } else if self.owned_weight.is_zero() {
            Decimal::ZERO
        } else {
            (weight * self.owned_quantity / self.owned_weight).min(self.owned_quantity)
        };
        let weight = weight.min(self.owned_weight);

        self.owned_quantity -= quantity;
        self.owned_weight -= weight;
        self.consumed_quantity += quantity;
        self.consumed_weight += weight;
        quantity
    }

    /// 停用批次（不會實體刪除）
    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// 依建立時間排序（舊的在前）
    pub fn cmp_by_age(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then(self.sequence.cmp(&other.sequence))
    }

    /// 檢查批次不變量
    pub fn check_invariants(&self) -> Result<()> {
        let fail = |msg: String| {
            Err(OwnershipError::CalculationInconsistency(format!(
                "批次 {} ({}): {}",
                self.id, self.source_reference, msg
            )))
        };

        if self.ownership_percentage < Decimal::ZERO || self.ownership_percentage > Decimal::ONE {
            return fail(format!("所有權比例超出範圍: {}", self.ownership_percentage));
        }
        if self.amount_paid < Decimal::ZERO || self.amount_paid > self.total_cost {
            return fail(format!(
                "已付 {} 超出成本 {}",
                self.amount_paid, self.total_cost
            ));
        }
        if self.amount_paid + self.outstanding_amount != self.total_cost {
            return fail(format!(
                "已付 {} + 未付 {} 不等於成本 {}",
                self.amount_paid, self.outstanding_amount, self.total_cost
            ));
        }
        if self.owned_quantity < Decimal::ZERO || self.owned_quantity > self.total_quantity {
            return fail(format!(
                "擁有數量 {} 超出範圍 [0, {}]",
                self.owned_quantity, self.total_quantity
            ));
        }
        if self.owned_weight < Decimal::ZERO || self.owned_weight > self.total_weight {
            return fail(format!(
                "擁有重量 {} 超出範圍 [0, {}]",
                self.owned_weight, self.total_weight
            ));
        }
        if self.owned_quantity + self.consumed_quantity > self.total_quantity
            || self.owned_weight + self.consumed_weight > self.total_weight
        {
            return fail("擁有量加上已消耗量超過整批".to_string());
        }
        Ok(())
    }
}

/// 比例轉百分比（僅供顯示）
pub fn ownership_percent(fraction: Decimal) -> Decimal {
    (fraction * Decimal::ONE_HUNDRED).round_dp(2)
}
