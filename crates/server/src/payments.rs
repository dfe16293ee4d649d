//! MercadoPago Checkout Pro integration.
//!
//! One call matters: creating a payment preference for a finalized
//! quotation. The preference carries the line items, the external
//! reference (our quotation number), and the three back URLs the gateway
//! redirects to after checkout.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const DEFAULT_API_BASE: &str = "https://api.mercadopago.com";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment gateway transport failure: {0}")]
    Transport(String),
    #[error("payment gateway rejected the request: {status} {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Clone)]
pub struct MercadoPagoClient {
    client: reqwest::Client,
    api_base: String,
    access_token: SecretString,
    currency: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
    pub currency_id: String,
}

#[derive(Debug, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub back_urls: BackUrls,
    pub external_reference: String,
}

#[derive(Debug, Deserialize)]
pub struct Preference {
    pub id: String,
    pub init_point: String,
}

impl MercadoPagoClient {
    pub fn new(access_token: SecretString, currency: impl Into<String>) -> Self {
        Self::with_api_base(access_token, currency, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        access_token: SecretString,
        currency: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self {
            client: reqwest::Client::new(),
            api_base,
            access_token,
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, PaymentError> {
        let response = self
            .client
            .post(format!("{}/checkout/preferences", self.api_base))
            .bearer_auth(self.access_token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|err| PaymentError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status: status.as_u16(), body });
        }

        let preference = response
            .json::<Preference>()
            .await
            .map_err(|err| PaymentError::Transport(format!("invalid preference payload: {err}")))?;

        info!(
            event_name = "payments.preference_created",
            preference_id = %preference.id,
            external_reference = %request.external_reference,
        );
        Ok(preference)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{BackUrls, MercadoPagoClient, PaymentError, PreferenceItem, PreferenceRequest};

    fn request_fixture() -> PreferenceRequest {
        PreferenceRequest {
            items: vec![PreferenceItem {
                title: "Plancha inoxidable 304 1.5mm".to_string(),
                quantity: 2,
                unit_price: Decimal::new(4_599_000, 2),
                currency_id: "CLP".to_string(),
            }],
            back_urls: BackUrls {
                success: "https://shop.example/api/quotations/abc/payment/success".to_string(),
                failure: "https://shop.example/api/quotations/abc/payment/failure".to_string(),
                pending: "https://shop.example/api/quotations/abc/payment/pending".to_string(),
            },
            external_reference: "COT202507140001".to_string(),
        }
    }

    #[test]
    fn preference_request_wire_shape() {
        let payload = serde_json::to_value(request_fixture()).expect("serialize");

        assert_eq!(
            payload,
            json!({
                "items": [{
                    "title": "Plancha inoxidable 304 1.5mm",
                    "quantity": 2,
                    "unit_price": 45990.0,
                    "currency_id": "CLP"
                }],
                "back_urls": {
                    "success": "https://shop.example/api/quotations/abc/payment/success",
                    "failure": "https://shop.example/api/quotations/abc/payment/failure",
                    "pending": "https://shop.example/api/quotations/abc/payment/pending"
                },
                "external_reference": "COT202507140001"
            })
        );
    }

    #[test]
    fn preference_response_decodes_id_and_init_point() {
        let preference: super::Preference = serde_json::from_value(json!({
            "id": "1273205088-aa1234bc",
            "init_point": "https://www.mercadopago.cl/checkout/v1/redirect?pref_id=1273205088",
            "sandbox_init_point": "https://sandbox.mercadopago.cl/checkout"
        }))
        .expect("decode");

        assert_eq!(preference.id, "1273205088-aa1234bc");
        assert!(preference.init_point.contains("pref_id"));
    }

    #[tokio::test]
    async fn transport_failure_is_reported() {
        let client = MercadoPagoClient::with_api_base(
            "TEST-token".into(),
            "CLP",
            "http://127.0.0.1:1",
        );

        let error = client.create_preference(&request_fixture()).await.unwrap_err();
        assert!(matches!(error, PaymentError::Transport(_)));
    }
}
