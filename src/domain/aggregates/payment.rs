//! Payment Aggregate and the Payday Flex installment plan

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::UnknownStatus;
use crate::domain::events::{DomainEvent, PaymentEvent};
use crate::domain::value_objects::{Money, MoneyError};

/// Earliest payday, in days after the order date.
pub const PAYDAY_MIN_DAYS: i64 = 7;
/// Latest payday, in days after the order date.
pub const PAYDAY_MAX_DAYS: i64 = 30;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    MobileMoney,
    Installment,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MobileMoney => "mobile_money",
            Self::Installment => "installment",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_money" => Ok(Self::MobileMoney),
            "installment" => Ok(Self::Installment),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// `Overdue` is never stored; see [`Payment::effective_status`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Partial,
    Failed,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Overdue => "overdue",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// 50/50 split of an order total with the second payment due on the chosen payday.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaydayFlexPlan {
    pub total: Money,
    pub first_payment: Money,
    pub second_payment: Money,
    pub due_date: NaiveDate,
}

impl PaydayFlexPlan {
    pub fn new(total: &Money, payday: NaiveDate, today: NaiveDate) -> Result<Self, PaydayFlexError> {
        if total.is_zero() || total.is_negative() {
            return Err(PaydayFlexError::NonPositiveTotal);
        }
        let (earliest, latest) = payday_window(today);
        if payday < earliest { return Err(PaydayFlexError::DateTooSoon { earliest }); }
        if payday > latest { return Err(PaydayFlexError::DateTooLate { latest }); }
        let (first_payment, second_payment) = split_in_half(total)?;
        Ok(Self { total: total.clone(), first_payment, second_payment, due_date: payday })
    }
}

/// First half rounded up to the minor unit; the second is the exact complement.
pub fn split_in_half(total: &Money) -> Result<(Money, Money), MoneyError> {
    let first = total.half_rounded_up();
    let second = total.subtract(&first)?;
    Ok((first, second))
}

/// Inclusive `[today + 7, today + 30]` window a payday must fall into.
pub fn payday_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today + Duration::days(PAYDAY_MIN_DAYS), today + Duration::days(PAYDAY_MAX_DAYS))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCharge {
    pub reference: String,
    pub amount: Money,
    pub phone_number: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub(crate) order_id: Uuid,
    pub(crate) method: PaymentMethod,
    pub(crate) status: PaymentStatus,
    pub(crate) amount_total: Money,
    pub(crate) amount_paid: Money,
    pub(crate) due_date: Option<NaiveDate>,
    pub(crate) pending_charge: Option<PendingCharge>,
    pub(crate) updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Payment {
    pub fn new(order_id: Uuid, method: PaymentMethod, total: Money) -> Self {
        let currency = total.currency().to_string();
        Self {
            order_id,
            method,
            status: PaymentStatus::Pending,
            amount_total: total,
            amount_paid: Money::zero(&currency),
            due_date: None,
            pending_charge: None,
            updated_at: Utc::now(),
            events: vec![],
        }
    }

    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn method(&self) -> PaymentMethod { self.method }
    pub fn status(&self) -> PaymentStatus { self.status }
    pub fn amount_total(&self) -> &Money { &self.amount_total }
    pub fn amount_paid(&self) -> &Money { &self.amount_paid }
    pub fn due_date(&self) -> Option<NaiveDate> { self.due_date }
    pub fn pending_charge(&self) -> Option<&PendingCharge> { self.pending_charge.as_ref() }

    pub fn amount_remaining(&self) -> Money {
        self.amount_total
            .subtract(&self.amount_paid)
            .unwrap_or_else(|_| self.amount_total.clone())
    }

    /// Stored status with `Overdue` derived for partial plans past their due date.
    pub fn effective_status(&self, today: NaiveDate) -> PaymentStatus {
        match (self.status, self.due_date) {
            (PaymentStatus::Partial, Some(due)) if today > due => PaymentStatus::Overdue,
            (status, _) => status,
        }
    }

    /// Starts a single mobile-money charge for the full total.
    pub fn start_full_charge(&mut self, reference: impl Into<String>, phone_number: impl Into<String>) -> Result<&PendingCharge, PaymentError> {
        self.ensure_startable()?;
        self.method = PaymentMethod::MobileMoney;
        self.due_date = None;
        let amount = self.amount_total.clone();
        Ok(self.open_charge(reference.into(), amount, phone_number.into()))
    }

    /// Switches to Payday Flex and starts the first installment charge.
    pub fn start_payday_flex(&mut self, plan: &PaydayFlexPlan, reference: impl Into<String>, phone_number: impl Into<String>) -> Result<&PendingCharge, PaymentError> {
        self.ensure_startable()?;
        if plan.total != self.amount_total {
            return Err(PaymentError::PlanMismatch);
        }
        self.method = PaymentMethod::Installment;
        self.due_date = Some(plan.due_date);
        Ok(self.open_charge(reference.into(), plan.first_payment.clone(), phone_number.into()))
    }

    /// Starts the second installment charge for whatever remains.
    pub fn start_second_installment(&mut self, reference: impl Into<String>, phone_number: impl Into<String>) -> Result<&PendingCharge, PaymentError> {
        if self.method != PaymentMethod::Installment { return Err(PaymentError::NotInstallment); }
        if self.status != PaymentStatus::Partial { return Err(PaymentError::NotPartial(self.status)); }
        if self.pending_charge.is_some() { return Err(PaymentError::ChargeInFlight); }
        let amount = self.amount_remaining();
        Ok(self.open_charge(reference.into(), amount, phone_number.into()))
    }

    /// Applies a successful provider callback for the in-flight charge.
    pub fn confirm_charge(&mut self, reference: &str) -> Result<(), PaymentError> {
        let charge = self.take_charge(reference)?;
        self.amount_paid = self.amount_paid.add(&charge.amount)?;
        self.status = if self.amount_remaining().is_zero() { PaymentStatus::Paid } else { PaymentStatus::Partial };
        self.changed();
        Ok(())
    }

    /// Applies a failed provider callback. A failed second installment leaves the plan partial.
    pub fn fail_charge(&mut self, reference: &str) -> Result<(), PaymentError> {
        self.take_charge(reference)?;
        if self.status == PaymentStatus::Pending {
            self.status = PaymentStatus::Failed;
        }
        self.changed();
        Ok(())
    }

    fn ensure_startable(&self) -> Result<(), PaymentError> {
        match self.status {
            PaymentStatus::Pending | PaymentStatus::Failed if self.pending_charge.is_none() => Ok(()),
            PaymentStatus::Pending | PaymentStatus::Failed => Err(PaymentError::ChargeInFlight),
            status => Err(PaymentError::AlreadyStarted(status)),
        }
    }

    fn open_charge(&mut self, reference: String, amount: Money, phone_number: String) -> &PendingCharge {
        if self.status == PaymentStatus::Failed {
            self.status = PaymentStatus::Pending;
        }
        self.updated_at = Utc::now();
        self.pending_charge.insert(PendingCharge { reference, amount, phone_number })
    }

    fn take_charge(&mut self, reference: &str) -> Result<PendingCharge, PaymentError> {
        match self.pending_charge.take() {
            Some(charge) if charge.reference == reference => Ok(charge),
            other => {
                self.pending_charge = other;
                Err(PaymentError::UnknownReference(reference.to_string()))
            }
        }
    }

    fn changed(&mut self) {
        self.updated_at = Utc::now();
        let remaining = self.amount_remaining().amount();
        self.events.push(DomainEvent::Payment(PaymentEvent::Updated {
            order_id: self.order_id,
            status: self.status,
            amount_paid: self.amount_paid.amount(),
            amount_remaining: remaining,
        }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaydayFlexError {
    #[error("order total must be positive")]
    NonPositiveTotal,
    #[error("payday must be on or after {earliest}")]
    DateTooSoon { earliest: NaiveDate },
    #[error("payday must be on or before {latest}")]
    DateTooLate { latest: NaiveDate },
    #[error(transparent)]
    Money(#[from] MoneyError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment is already {0}")]
    AlreadyStarted(PaymentStatus),
    #[error("a charge is already awaiting confirmation")]
    ChargeInFlight,
    #[error("payment is not an installment plan")]
    NotInstallment,
    #[error("second installment requires a partial payment, found {0}")]
    NotPartial(PaymentStatus),
    #[error("plan total does not match the order total")]
    PlanMismatch,
    #[error("no pending charge with reference `{0}`")]
    UnknownReference(String),
    #[error(transparent)]
    Money(#[from] MoneyError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

    #[test]
    fn test_split_examples() {
        let (first, second) = split_in_half(&Money::ghs(Decimal::new(10000, 2))).unwrap();
        assert_eq!((first.amount(), second.amount()), (Decimal::new(50, 0), Decimal::new(50, 0)));

        let (first, second) = split_in_half(&Money::ghs(Decimal::new(9999, 2))).unwrap();
        assert_eq!(first.amount(), Decimal::new(5000, 2));
        assert_eq!(second.amount(), Decimal::new(4999, 2));
    }

    #[test]
    fn test_split_always_sums_to_total() {
        for cents in [1_i64, 2, 3, 99, 101, 1999, 4_321_987, 123_456_789] {
            let total = Money::ghs(Decimal::new(cents, 2));
            let (first, second) = split_in_half(&total).unwrap();
            assert_eq!(first.add(&second).unwrap(), total, "total {cents}");
            assert!(first.amount() >= second.amount());
        }
    }

    #[test]
    fn test_payday_window_bounds() {
        let today = date(2026, 10, 19);
        let total = Money::ghs(Decimal::new(200, 0));
        assert!(PaydayFlexPlan::new(&total, date(2026, 10, 26), today).is_ok());
        assert!(PaydayFlexPlan::new(&total, date(2026, 11, 18), today).is_ok());
        assert_eq!(
            PaydayFlexPlan::new(&total, date(2026, 10, 25), today),
            Err(PaydayFlexError::DateTooSoon { earliest: date(2026, 10, 26) })
        );
        assert_eq!(
            PaydayFlexPlan::new(&total, date(2026, 11, 19), today),
            Err(PaydayFlexError::DateTooLate { latest: date(2026, 11, 18) })
        );
        assert_eq!(PaydayFlexPlan::new(&Money::ghs(Decimal::ZERO), date(2026, 10, 30), today), Err(PaydayFlexError::NonPositiveTotal));
    }

    #[test]
    fn test_installment_lifecycle_and_overdue() {
        let today = date(2026, 10, 19);
        let total = Money::ghs(Decimal::new(9999, 2));
        let plan = PaydayFlexPlan::new(&total, date(2026, 11, 1), today).unwrap();
        let mut payment = Payment::new(Uuid::new_v4(), PaymentMethod::MobileMoney, total);

        payment.start_payday_flex(&plan, "ref-1", "0240000000").unwrap();
        assert_eq!(payment.method(), PaymentMethod::Installment);
        assert!(payment.confirm_charge("ref-x").is_err());
        payment.confirm_charge("ref-1").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Partial);
        assert_eq!(payment.amount_remaining().amount(), Decimal::new(4999, 2));

        assert_eq!(payment.effective_status(date(2026, 11, 1)), PaymentStatus::Partial);
        assert_eq!(payment.effective_status(date(2026, 11, 2)), PaymentStatus::Overdue);

        payment.start_second_installment("ref-2", "0240000000").unwrap();
        payment.fail_charge("ref-2").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Partial);

        let charge = payment.start_second_installment("ref-3", "0240000000").unwrap();
        assert_eq!(charge.amount.amount(), Decimal::new(4999, 2));
        payment.confirm_charge("ref-3").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Paid);
        assert_eq!(payment.effective_status(date(2026, 12, 1)), PaymentStatus::Paid);
        assert_eq!(payment.take_events().len(), 3);
    }

    #[test]
    fn test_full_charge_failure_then_retry() {
        let mut payment = Payment::new(Uuid::new_v4(), PaymentMethod::MobileMoney, Money::ghs(Decimal::new(40, 0)));
        payment.start_full_charge("a", "0550000000").unwrap();
        assert_eq!(payment.start_full_charge("b", "0550000000").unwrap_err(), PaymentError::ChargeInFlight);
        payment.fail_charge("a").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Failed);
        payment.start_full_charge("c", "0550000000").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Pending);
        payment.confirm_charge("c").unwrap();
        assert_eq!(payment.status(), PaymentStatus::Paid);
        assert_eq!(payment.start_full_charge("d", "0550000000").unwrap_err(), PaymentError::AlreadyStarted(PaymentStatus::Paid));
    }
}
