// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BillingError;

static CYCLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(0[1-9]|1[0-2])$").expect("static cycle pattern"));

/// One month's invoicing period, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingCycle {
    year: i32,
    month: u32,
}

impl BillingCycle {
    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(BillingError::Validation(format!(
                "invalid billing cycle {}-{}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or_else(|| self.first_day())
    }

    pub fn days(&self) -> u32 {
        self.last_day().day()
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// `day` of this cycle, clamped to the cycle's last day.
    pub fn day_clamped(&self, day: u32) -> NaiveDate {
        let d = day.clamp(1, self.days());
        NaiveDate::from_ymd_opt(self.year, self.month, d).unwrap_or_else(|| self.last_day())
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingCycle {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = CYCLE_RE.captures(s.trim()).ok_or_else(|| {
            BillingError::Validation(format!("invalid billing cycle '{}', expected YYYY-MM", s))
        })?;
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| BillingError::Validation(format!("invalid year in '{}'", s)))?;
        let month: u32 = caps[2]
            .parse()
            .map_err(|_| BillingError::Validation(format!("invalid month in '{}'", s)))?;
        Self::new(year, month)
    }
}

impl TryFrom<String> for BillingCycle {
    type Error = BillingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<BillingCycle> for String {
    fn from(c: BillingCycle) -> Self {
        c.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeterKind {
    Water,
    Electricity,
}

impl MeterKind {
    pub const ALL: [MeterKind; 2] = [MeterKind::Water, MeterKind::Electricity];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeterKind::Water => "water",
            MeterKind::Electricity => "electricity",
        }
    }

    pub fn line_kind(&self) -> LineKind {
        match self {
            MeterKind::Water => LineKind::Water,
            MeterKind::Electricity => LineKind::Electricity,
        }
    }
}

impl fmt::Display for MeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeterKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "water" => Ok(MeterKind::Water),
            "electricity" | "electric" => Ok(MeterKind::Electricity),
            other => Err(BillingError::Validation(format!(
                "unknown meter kind '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Rent,
    Water,
    Electricity,
    Service,
    Discount,
    Fine,
    /// Only ever supplied by callers, e.g. a pending charge collecting a
    /// deposit on a move-in invoice. Deposits returned at settlement are
    /// `Refund` lines.
    Deposit,
    /// Same as `Deposit`, for advance payments.
    Advance,
    Refund,
    CarryOver,
}

impl LineKind {
    /// Discounts and refunds carry negative amounts; everything else is a charge.
    pub fn is_credit(&self) -> bool {
        matches!(self, LineKind::Discount | LineKind::Refund)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineKind::Rent => "rent",
            LineKind::Water => "water",
            LineKind::Electricity => "electricity",
            LineKind::Service => "service",
            LineKind::Discount => "discount",
            LineKind::Fine => "fine",
            LineKind::Deposit => "deposit",
            LineKind::Advance => "advance",
            LineKind::Refund => "refund",
            LineKind::CarryOver => "carry_over",
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LineKind {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_lowercase().as_str() {
            "rent" => LineKind::Rent,
            "water" => LineKind::Water,
            "electricity" => LineKind::Electricity,
            "service" => LineKind::Service,
            "discount" => LineKind::Discount,
            "fine" => LineKind::Fine,
            "deposit" => LineKind::Deposit,
            "advance" => LineKind::Advance,
            "refund" => LineKind::Refund,
            "carry_over" | "carry-over" => LineKind::CarryOver,
            other => {
                return Err(BillingError::Validation(format!(
                    "unknown line kind '{}'",
                    other
                )));
            }
        };
        Ok(kind)
    }
}

/// Contract terms captured when the contract was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    pub contract_id: i64,
    pub water_rate: Decimal,
    pub electricity_rate: Decimal,
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    pub advance: Decimal,
    pub effective_from: NaiveDate,
    pub effective_to: Option<NaiveDate>,
}

impl RateTable {
    pub fn unit_price(&self, meter: MeterKind) -> Decimal {
        match meter {
            MeterKind::Water => self.water_rate,
            MeterKind::Electricity => self.electricity_rate,
        }
    }

    pub fn held_funds(&self) -> Decimal {
        self.deposit + self.advance
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub id: i64,
    pub room_id: i64,
    pub cycle: BillingCycle,
    pub kind: MeterKind,
    pub previous: Decimal,
    pub current: Decimal,
    pub read_on: NaiveDate,
    pub replaced: bool,
}

/// Unfinalized line: the builder computes `amount` from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDraft {
    pub kind: LineKind,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub ref_invoice_id: Option<i64>,
}

impl LineDraft {
    pub fn new(
        kind: LineKind,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        Self {
            kind,
            description: description.into(),
            quantity,
            unit_price,
            ref_invoice_id: None,
        }
    }

    /// Flat one-off line (`quantity = 1`).
    pub fn flat(kind: LineKind, description: impl Into<String>, amount: Decimal) -> Self {
        Self::new(kind, description, Decimal::ONE, amount)
    }

    pub fn referencing(mut self, invoice_id: i64) -> Self {
        self.ref_invoice_id = Some(invoice_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub kind: LineKind,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub ref_invoice_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(InvoiceStatus::Pending),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            other => Err(BillingError::Validation(format!(
                "unknown invoice status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub invoice_id: i64,
    pub amount: Decimal,
    pub method: String,
    pub paid_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub contract_id: i64,
    pub room_id: i64,
    pub cycle: BillingCycle,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<LineItem>,
    pub total: Decimal,
    pub payment: Option<Payment>,
}

impl Invoice {
    /// Status as of `today`; overdue is never stored.
    pub fn status_on(&self, today: NaiveDate) -> InvoiceStatus {
        if self.payment.is_some() {
            InvoiceStatus::Paid
        } else if today > self.due_date {
            InvoiceStatus::Overdue
        } else {
            InvoiceStatus::Pending
        }
    }

    pub fn paid_date(&self) -> Option<NaiveDate> {
        self.payment.as_ref().map(|p| p.paid_on)
    }

    /// Whole days past the due date as of `on` (zero when not late).
    pub fn days_overdue(&self, on: NaiveDate) -> i64 {
        (on - self.due_date).num_days().max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    TenantOwes,
    RefundDue,
    Even,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: i64,
    pub contract_id: i64,
    pub room_id: i64,
    pub settled_on: NaiveDate,
    pub gross_charges: Decimal,
    pub held_funds: Decimal,
    pub net_amount: Decimal,
    pub lines: Vec<LineItem>,
}

impl Settlement {
    pub fn outcome(&self) -> SettlementOutcome {
        if self.net_amount > Decimal::ZERO {
            SettlementOutcome::TenantOwes
        } else if self.net_amount < Decimal::ZERO {
            SettlementOutcome::RefundDue
        } else {
            SettlementOutcome::Even
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Terminated,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Active => "active",
            ContractStatus::Terminated => "terminated",
        }
    }
}

impl FromStr for ContractStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ContractStatus::Active),
            "terminated" => Ok(ContractStatus::Terminated),
            other => Err(BillingError::Corrupt(format!(
                "unknown contract status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: i64,
    pub room_id: i64,
    pub tenant: String,
    pub start_date: NaiveDate,
    pub status: ContractStatus,
    pub terminated_on: Option<NaiveDate>,
    pub final_water: Option<Decimal>,
    pub final_electricity: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DormPolicy {
    pub payment_due_day: u32,
    pub late_fee_per_day: Decimal,
    pub auto_apply_late_fee: bool,
}

impl Default for DormPolicy {
    fn default() -> Self {
        Self {
            payment_due_day: 5,
            late_fee_per_day: Decimal::ZERO,
            auto_apply_late_fee: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dormitory {
    pub id: i64,
    pub name: String,
    pub water_rate: Decimal,
    pub electricity_rate: Decimal,
    pub policy: DormPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub dormitory_id: i64,
    pub number: String,
    pub monthly_rent: Decimal,
    pub deposit: Decimal,
    pub advance: Decimal,
}

/// Room-level charge waiting for the next invoice or the settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCharge {
    pub id: i64,
    pub room_id: i64,
    pub cycle: BillingCycle,
    pub line: LineDraft,
}
