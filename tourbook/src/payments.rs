//! Hosted checkout
//!
//! The API never sees card data: it asks the payment provider for a
//! checkout session describing one tour and returns the session to the
//! client, which redirects the customer to it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    Json,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::PaymentsConfig;
use crate::context::RequestContext;
use crate::error::Error;
use crate::handlers::{ApiError, ApiOperation};
use crate::query::{scope_filter, scope_projection};
use crate::repository::{Document, DocumentStore};
use crate::resources::{Resource, Tour};
use crate::state::AppState;

/// Payment provider errors
#[derive(Debug, Error)]
pub enum PaymentError {
    /// No provider key configured
    #[error("payments are disabled")]
    Disabled,

    /// Provider could not be reached
    #[error("payment provider request failed: {0}")]
    Request(String),

    /// Provider answered with an error status
    #[error("payment provider rejected the request ({status}): {body}")]
    Rejected {
        /// HTTP status returned by the provider
        status: u16,
        /// Response body
        body: String,
    },
}

/// What to charge for
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRequest {
    /// Tour `_id`, echoed back as the client reference
    pub tour_id: String,
    /// Line item name
    pub name: String,
    /// Line item description
    pub description: String,
    /// Product images (absolute URLs)
    pub images: Vec<String>,
    /// Amount in the smallest currency unit
    pub amount_cents: i64,
    /// Customer email
    pub customer_email: String,
    /// Redirect after payment
    pub success_url: String,
    /// Redirect when the customer gives up
    pub cancel_url: String,
}

/// Creates hosted checkout sessions
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Create a session; the provider's response is returned as-is
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<Value, PaymentError>;
}

/// Gateway used when no provider key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_checkout_session(&self, _request: CheckoutRequest) -> Result<Value, PaymentError> {
        Err(PaymentError::Disabled)
    }
}

/// Stripe Checkout over its form-encoded REST API
#[derive(Clone)]
pub struct StripeGateway {
    http_client: HttpClient,
    secret_key: String,
    api_base: String,
    currency: String,
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl StripeGateway {
    /// Build from configuration
    ///
    /// Returns `Ok(None)` when no secret key is configured.
    pub fn from_config(config: &PaymentsConfig) -> Result<Option<Self>, PaymentError> {
        let Some(secret_key) = config.secret_key.clone().filter(|key| !key.is_empty()) else {
            return Ok(None);
        };

        let http_client = HttpClient::builder()
            .user_agent("tourbook")
            .build()
            .map_err(|e| PaymentError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Some(Self {
            http_client,
            secret_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            currency: config.currency.clone(),
        }))
    }

    fn form(&self, request: &CheckoutRequest) -> Vec<(String, String)> {
        let item = "line_items[0]";
        let mut form = vec![
            ("mode".to_string(), "payment".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("customer_email".to_string(), request.customer_email.clone()),
            ("client_reference_id".to_string(), request.tour_id.clone()),
            (format!("{item}[quantity]"), "1".to_string()),
            (format!("{item}[price_data][currency]"), self.currency.clone()),
            (format!("{item}[price_data][unit_amount]"), request.amount_cents.to_string()),
            (format!("{item}[price_data][product_data][name]"), request.name.clone()),
        ];
        if !request.description.is_empty() {
            form.push((
                format!("{item}[price_data][product_data][description]"),
                request.description.clone(),
            ));
        }
        for (i, image) in request.images.iter().enumerate() {
            form.push((format!("{item}[price_data][product_data][images][{i}]"), image.clone()));
        }
        form
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<Value, PaymentError> {
        let response = self
            .http_client
            .post(format!("{}/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&self.form(&request))
            .send()
            .await
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| PaymentError::Request(format!("invalid session payload: {}", e)))
    }
}

/// Pick the gateway for this configuration
pub fn gateway_from_config(config: &PaymentsConfig) -> Result<Arc<dyn PaymentGateway>, PaymentError> {
    Ok(match StripeGateway::from_config(config)? {
        Some(stripe) => Arc::new(stripe),
        None => {
            tracing::warn!("no payments secret key configured; checkout is disabled");
            Arc::new(DisabledGateway)
        }
    })
}

/// Response of the checkout endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    /// Always `success`
    pub status: String,
    /// Provider session
    pub session: Value,
}

fn text(doc: &Document, field: &str) -> String {
    doc.get(field).and_then(Value::as_str).unwrap_or_default().to_string()
}

/// `GET /bookings/checkout-session/{tourId}`
pub async fn checkout_session<S: DocumentStore>(
    State(state): State<AppState<S>>,
    context: RequestContext,
    Path(tour_id): Path<String>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let identity = context
        .identity
        .ok_or_else(|| ApiError::unauthorized("You are not logged in! Please log in to get access."))?;

    let decorations = Tour::read_decorations();
    let tour = state
        .store()
        .find_by_id(
            Tour::COLLECTION,
            &tour_id,
            &scope_filter(&decorations),
            &scope_projection(&decorations),
        )
        .await?
        .ok_or_else(|| ApiError::not_found(Tour::NAME, &tour_id).with_operation(ApiOperation::Checkout))?;

    let public_url = state.config().service.public_url.trim_end_matches('/').to_string();
    let price = tour.get("price").and_then(Value::as_f64).unwrap_or_default();
    let request = CheckoutRequest {
        tour_id: tour_id.clone(),
        name: format!("{} Tour", text(&tour, "name")),
        description: text(&tour, "summary"),
        images: vec![format!("{}/img/tours/{}", public_url, text(&tour, "imageCover"))],
        amount_cents: (price * 100.0).round() as i64,
        customer_email: identity.email().to_string(),
        success_url: format!("{}/my-tours", public_url),
        cancel_url: format!("{}/tour/{}", public_url, text(&tour, "slug")),
    };

    let session = state
        .payments()
        .create_checkout_session(request)
        .await
        .map_err(|e| ApiError::from(Error::from(e)))?;

    tracing::info!(tour = %tour_id, user = %identity.id(), "checkout session created");
    Ok(Json(CheckoutResponse {
        status: "success".to_string(),
        session,
    }))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            tour_id: "t1".into(),
            name: "The Forest Hiker Tour".into(),
            description: "Breathtaking hike".into(),
            images: vec!["http://localhost/img/tours/a.jpg".into()],
            amount_cents: 39700,
            customer_email: "a@b.io".into(),
            success_url: "http://localhost/my-tours".into(),
            cancel_url: "http://localhost/tour/the-forest-hiker".into(),
        }
    }

    #[test]
    fn test_no_key_means_no_stripe() {
        assert!(StripeGateway::from_config(&PaymentsConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_form_encoding() {
        let gateway = StripeGateway::from_config(&PaymentsConfig {
            secret_key: Some("sk_test".into()),
            ..PaymentsConfig::default()
        })
        .unwrap()
        .unwrap();

        let form = gateway.form(&request());
        let get = |key: &str| form.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("39700"));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(get("client_reference_id"), Some("t1"));
        assert_eq!(
            get("line_items[0][price_data][product_data][images][0]"),
            Some("http://localhost/img/tours/a.jpg")
        );
    }

    #[tokio::test]
    async fn test_disabled_gateway() {
        let err = DisabledGateway.create_checkout_session(request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Disabled));
    }
}
