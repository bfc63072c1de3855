//! Credit ledger adapter
//!
//! Narrow contract against the external credit ledger service: add credits
//! back to a payer account and report the new balance. The reference note
//! carries the lesson id, which the ledger uses as a dedup key so a replayed
//! refund is applied at most once.

use async_trait::async_trait;
use lessonloop_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

const LEDGER_TIMEOUT_SECS: u64 = 10;

/// Credit ledger operations needed by the confirmation workflow
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Add credits to a payer account, returning the new balance
    async fn add_credits(&self, payer_id: Uuid, amount: i64, reference_note: &str)
        -> Result<i64>;
}

#[derive(Debug, Serialize)]
struct AddCreditsRequest<'a> {
    payer_id: Uuid,
    amount: i64,
    reference_note: &'a str,
}

#[derive(Debug, Deserialize)]
struct AddCreditsResponse {
    new_balance: i64,
}

/// HTTP client for the hosted credit ledger service
pub struct HttpCreditLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCreditLedger {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(LEDGER_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, base_url }
    }
}

#[async_trait]
impl CreditLedger for HttpCreditLedger {
    async fn add_credits(
        &self,
        payer_id: Uuid,
        amount: i64,
        reference_note: &str,
    ) -> Result<i64> {
        let url = format!("{}/credits/add", self.base_url);
        let request = AddCreditsRequest {
            payer_id,
            amount,
            reference_note,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::CompensationFailed(format!("ledger request: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::CompensationFailed(format!(
                "ledger returned {} for payer {}",
                response.status(),
                payer_id
            )));
        }

        let body: AddCreditsResponse = response
            .json()
            .await
            .map_err(|e| Error::CompensationFailed(format!("ledger response: {}", e)))?;

        Ok(body.new_balance)
    }
}
