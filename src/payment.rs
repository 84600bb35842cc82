// Payment records for dubbing jobs
//
// Charging goes through a gateway seam (simulated in this deployment).
// Whatever the gateway, stored records never hold raw instrument data:
// card numbers are reduced to brand + last four digits at the API boundary
// and only the masked form crosses into the store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::error::{DubError, Result};

/// Tax applied on top of the base amount.
pub const TAX_RATE: f64 = 0.18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Rupay,
    Unknown,
}

impl CardBrand {
    /// Issuer detection by number prefix.
    pub fn detect(number: &str) -> Self {
        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.starts_with('4') {
            CardBrand::Visa
        } else if matches!(digits.get(..2), Some("51" | "52" | "53" | "54" | "55")) {
            CardBrand::Mastercard
        } else if matches!(digits.get(..2), Some("34" | "37")) {
            CardBrand::Amex
        } else if digits.starts_with('6') {
            // 60/65/81/82 ranges overlap; RuPay is the 60/65 subset
            if matches!(digits.get(..2), Some("60" | "65")) {
                CardBrand::Rupay
            } else {
                CardBrand::Discover
            }
        } else {
            CardBrand::Unknown
        }
    }
}

/// Raw instrument details as submitted. This type never reaches the store;
/// it is masked immediately after validation.
#[derive(Debug, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentInstrument {
    Card {
        card_number: String,
        card_holder: String,
    },
    Upi {
        upi_id: String,
    },
}

impl PaymentInstrument {
    pub fn validate(&self) -> Result<()> {
        match self {
            PaymentInstrument::Card { card_number, .. } => {
                let digits: String = card_number
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != '-')
                    .collect();
                if digits.len() < 13
                    || digits.len() > 19
                    || !digits.chars().all(|c| c.is_ascii_digit())
                {
                    return Err(DubError::Validation(
                        "Card number must be 13-19 digits".to_string(),
                    ));
                }
                Ok(())
            }
            PaymentInstrument::Upi { upi_id } => {
                if !upi_id.contains('@') || upi_id.starts_with('@') || upi_id.ends_with('@') {
                    return Err(DubError::Validation(
                        "UPI id must look like name@provider".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Reduce to the storable form: last four digits and brand for cards,
    /// the handle for UPI. The full number is dropped here.
    pub fn mask(&self) -> MaskedInstrument {
        match self {
            PaymentInstrument::Card { card_number, .. } => {
                let digits: String = card_number
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect();
                let last_four = digits
                    .get(digits.len().saturating_sub(4)..)
                    .unwrap_or("")
                    .to_string();
                MaskedInstrument::Card {
                    brand: CardBrand::detect(&digits),
                    last_four,
                }
            }
            PaymentInstrument::Upi { upi_id } => MaskedInstrument::Upi {
                upi_id: upi_id.clone(),
            },
        }
    }
}

/// The only instrument representation that is persisted or serialized back
/// to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MaskedInstrument {
    Card { brand: CardBrand, last_four: String },
    Upi { upi_id: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub job_id: Uuid,
    pub plan_name: String,
    pub transaction_id: String,
    pub amount: f64,
    pub tax: f64,
    pub total: f64,
    pub currency: String,
    pub instrument: MaskedInstrument,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Totals are rounded to whole paise/cents.
pub fn amounts_for(amount: f64) -> (f64, f64) {
    let tax = (amount * TAX_RATE * 100.0).round() / 100.0;
    let total = ((amount + tax) * 100.0).round() / 100.0;
    (tax, total)
}

fn transaction_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TXN{}{}", Utc::now().timestamp_millis(), &suffix[..6])
}

/// Charging seam. The production deployment simulates settlement; a real
/// acquirer integration slots in behind the same trait.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, total: f64, instrument: &MaskedInstrument) -> Result<PaymentStatus>;
}

pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, total: f64, _instrument: &MaskedInstrument) -> Result<PaymentStatus> {
        if total <= 0.0 {
            return Err(DubError::Payment(
                "Charge amount must be positive".to_string(),
            ));
        }
        Ok(PaymentStatus::Completed)
    }
}

/// In-memory payment ledger, owner-scoped like the job store.
#[derive(Clone)]
pub struct PaymentStore {
    inner: Arc<RwLock<HashMap<Uuid, PaymentRecord>>>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentStore {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            gateway,
        }
    }

    /// Validate, mask, charge, and record one payment.
    pub async fn charge(
        &self,
        owner_id: Uuid,
        job_id: Uuid,
        plan_name: &str,
        amount: f64,
        instrument: PaymentInstrument,
    ) -> Result<PaymentRecord> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DubError::Validation(
                "Payment amount must be positive".to_string(),
            ));
        }
        if plan_name.trim().is_empty() {
            return Err(DubError::Validation(
                "Plan name must not be empty".to_string(),
            ));
        }
        instrument.validate()?;
        let masked = instrument.mask();

        let (tax, total) = amounts_for(amount);
        let status = self.gateway.charge(total, &masked).await?;

        let record = PaymentRecord {
            id: Uuid::new_v4(),
            owner_id,
            job_id,
            plan_name: plan_name.to_string(),
            transaction_id: transaction_id(),
            amount,
            tax,
            total,
            currency: "INR".to_string(),
            instrument: masked,
            status,
            created_at: Utc::now(),
        };

        self.inner.write().await.insert(record.id, record.clone());
        info!(
            payment_id = %record.id,
            transaction = %record.transaction_id,
            total = record.total,
            "Payment recorded"
        );
        Ok(record)
    }

    /// Existence is checked before ownership so unknown ids surface as 404.
    pub async fn get_owned(&self, id: Uuid, owner_id: Uuid) -> Result<PaymentRecord> {
        let record = self
            .inner
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| DubError::NotFound(format!("Payment {} not found", id)))?;
        if record.owner_id != owner_id {
            return Err(DubError::Forbidden(format!(
                "Payment {} is not owned by the requesting user",
                id
            )));
        }
        Ok(record)
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Vec<PaymentRecord> {
        let guard = self.inner.read().await;
        let mut records: Vec<PaymentRecord> = guard
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Only completed payments can be refunded.
    pub async fn refund(&self, id: Uuid, owner_id: Uuid) -> Result<PaymentRecord> {
        self.get_owned(id, owner_id).await?;
        let mut guard = self.inner.write().await;
        let record = guard
            .get_mut(&id)
            .ok_or_else(|| DubError::NotFound(format!("Payment {} not found", id)))?;
        if record.status != PaymentStatus::Completed {
            return Err(DubError::Payment(format!(
                "Payment {} is not refundable in status {:?}",
                id, record.status
            )));
        }
        record.status = PaymentStatus::Refunded;
        info!(payment_id = %id, "Payment refunded");
        Ok(record.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PaymentStore {
        PaymentStore::new(Arc::new(SimulatedGateway))
    }

    fn card(number: &str) -> PaymentInstrument {
        PaymentInstrument::Card {
            card_number: number.to_string(),
            card_holder: "A Customer".to_string(),
        }
    }

    #[test]
    fn test_brand_detection() {
        assert_eq!(CardBrand::detect("4111111111111111"), CardBrand::Visa);
        assert_eq!(CardBrand::detect("5500000000000004"), CardBrand::Mastercard);
        assert_eq!(CardBrand::detect("340000000000009"), CardBrand::Amex);
        assert_eq!(CardBrand::detect("6011000000000004"), CardBrand::Rupay);
        assert_eq!(CardBrand::detect("9999000000000000"), CardBrand::Unknown);
    }

    #[test]
    fn test_masking_keeps_only_last_four() {
        let masked = card("4111 1111 1111 1234").mask();
        match masked {
            MaskedInstrument::Card { brand, last_four } => {
                assert_eq!(brand, CardBrand::Visa);
                assert_eq!(last_four, "1234");
            }
            _ => panic!("expected card"),
        }
    }

    #[test]
    fn test_tax_computation() {
        let (tax, total) = amounts_for(100.0);
        assert_eq!(tax, 18.0);
        assert_eq!(total, 118.0);

        let (tax, total) = amounts_for(99.99);
        assert_eq!(tax, 18.0);
        assert_eq!(total, 117.99);
    }

    #[tokio::test]
    async fn test_stored_record_is_masked() {
        let store = store();
        let owner = Uuid::new_v4();
        let record = store
            .charge(owner, Uuid::new_v4(), "pro", 250.0, card("4111111111111111"))
            .await
            .unwrap();

        assert_eq!(record.status, PaymentStatus::Completed);
        assert!(record.transaction_id.starts_with("TXN"));
        let serialized = serde_json::to_string(&record).unwrap();
        assert!(!serialized.contains("4111111111111111"));
        assert!(serialized.contains("1111"));
        assert!(serialized.contains("visa"));
    }

    #[tokio::test]
    async fn test_invalid_instruments_rejected() {
        let store = store();
        let owner = Uuid::new_v4();
        let err = store
            .charge(owner, Uuid::new_v4(), "basic", 100.0, card("1234"))
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Validation(_)));

        let err = store
            .charge(
                owner,
                Uuid::new_v4(),
                "basic",
                100.0,
                PaymentInstrument::Upi {
                    upi_id: "missing-at-sign".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DubError::Validation(_)));
    }

    #[tokio::test]
    async fn test_refund_lifecycle() {
        let store = store();
        let owner = Uuid::new_v4();
        let record = store
            .charge(
                owner,
                Uuid::new_v4(),
                "basic",
                100.0,
                PaymentInstrument::Upi {
                    upi_id: "someone@bank".to_string(),
                },
            )
            .await
            .unwrap();

        let err = store.refund(record.id, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DubError::Forbidden(_)));

        let refunded = store.refund(record.id, owner).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);

        // Double refund is refused
        let err = store.refund(record.id, owner).await.unwrap_err();
        assert!(matches!(err, DubError::Payment(_)));
    }
}
