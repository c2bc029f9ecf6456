//! HTTP client for the platform backend.
//!
//! The backend is the source of truth for donation state; this client
//! covers the two endpoints the payment flow needs. Requests carry the
//! configured bearer token and a fixed timeout, and a timed-out request is
//! surfaced as its own error kind so callers can offer a retry.

use std::time::Duration;

use async_trait::async_trait;
use lifeline_config::BackendSettings;
use lifeline_types::{BackendError, DonationBackend, DonationCheck, DonationIntent};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct BackendClient {
	http: reqwest::Client,
	base_url: String,
	auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	message: Option<String>,
}

impl BackendClient {
	pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(settings.timeout_secs))
			.build()
			.map_err(|e| BackendError::Network(e.to_string()))?;

		Ok(Self {
			http,
			base_url: settings.base_url.trim_end_matches('/').to_string(),
			auth_token: settings.auth_token.clone(),
		})
	}

	fn endpoint(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path)
	}

	async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
		let url = self.endpoint(path);
		debug!(url = %url, "backend request");

		let mut request = self.http.get(&url);
		if let Some(token) = &self.auth_token {
			request = request.bearer_auth(token);
		}

		let response = request.send().await.map_err(|e| {
			if e.is_timeout() {
				BackendError::Timeout
			} else {
				BackendError::Network(e.to_string())
			}
		})?;

		let status = response.status();
		if !status.is_success() {
			let message = response
				.json::<ErrorBody>()
				.await
				.ok()
				.and_then(|body| body.message)
				.unwrap_or_else(|| {
					status
						.canonical_reason()
						.unwrap_or("request failed")
						.to_string()
				});
			warn!(url = %url, status = status.as_u16(), message = %message, "backend error response");
			return Err(BackendError::Api {
				status: status.as_u16(),
				message,
			});
		}

		response
			.json()
			.await
			.map_err(|e| BackendError::Decode(e.to_string()))
	}
}

#[async_trait]
impl DonationBackend for BackendClient {
	async fn donation_info(&self, donate_id: &str) -> Result<DonationIntent, BackendError> {
		self.get_json(&format!("fundraise/donate/info/{}", donate_id))
			.await
	}

	async fn check_donation(&self, donate_id: &str) -> Result<DonationCheck, BackendError> {
		self.get_json(&format!("fundraise/donate/check/{}", donate_id))
			.await
	}
}
