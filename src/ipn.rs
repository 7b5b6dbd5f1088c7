//! # PayPal IPN Intake
//!
//! Parses form-encoded Instant Payment Notifications into
//! [`PaymentNotification`]s and optionally confirms them with PayPal by
//! posting the untouched body back with `cmd=_notify-validate`.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::PayPalConfig;
use crate::entitlements::PaymentNotification;
use crate::error::truncate_chars;

const VERIFIED: &str = "VERIFIED";

/// Errors raised while confirming a notification with PayPal
#[derive(Debug, Error)]
pub enum IpnError {
    #[error("notification was not verified by PayPal: {0}")]
    NotVerified(String),

    #[error("PayPal verification endpoint returned HTTP {status}")]
    Http { status: u16 },

    #[error("PayPal verification request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// Parse a form-encoded IPN body.
///
/// Missing fields become empty strings; the entitlement manager rejects a
/// notification without `txn_id` or `payer_email`.
pub fn parse_notification(body: &[u8]) -> PaymentNotification {
    let fields: HashMap<String, String> = url::form_urlencoded::parse(body)
        .into_owned()
        .collect();

    let text = |name: &str| fields.get(name).map(|value| value.trim().to_string()).unwrap_or_default();
    let optional = |name: &str| {
        fields
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    PaymentNotification {
        transaction_id: text("txn_id"),
        payer_email: text("payer_email"),
        first_name: text("first_name"),
        last_name: text("last_name"),
        gross_amount: optional("mc_gross"),
        currency: optional("mc_currency"),
        payment_status: text("payment_status"),
    }
}

/// Postback verifier. Disabled verifiers accept every notification.
#[derive(Debug, Clone)]
pub struct IpnVerifier {
    client: reqwest::Client,
    verify_url: Option<String>,
}

impl IpnVerifier {
    pub fn new(config: &PayPalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            verify_url: config.verify_ipn.then(|| config.ipn_verify_url.clone()),
        }
    }

    /// Verifier that skips the postback
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            verify_url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.verify_url.is_some()
    }

    /// Confirm the raw notification body with PayPal
    pub async fn verify(&self, raw_body: &[u8]) -> Result<(), IpnError> {
        let Some(verify_url) = self.verify_url.as_deref() else {
            return Ok(());
        };

        let mut postback = b"cmd=_notify-validate&".to_vec();
        postback.extend_from_slice(raw_body);

        let response = self
            .client
            .post(verify_url)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(postback)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "IPN verification endpoint rejected postback");
            return Err(IpnError::Http {
                status: status.as_u16(),
            });
        }

        let answer = response.text().await?;
        if answer.trim() == VERIFIED {
            debug!("IPN verified");
            Ok(())
        } else {
            Err(IpnError::NotVerified(truncate_chars(answer.trim(), 64)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string, method, path},
    };

    const BODY: &str = "txn_id=T1&payer_email=a%40x.com&first_name=Ada&last_name=Lovelace\
&mc_gross=10.00&mc_currency=USD&payment_status=Completed";

    fn enabled_config(url: String) -> PayPalConfig {
        PayPalConfig {
            verify_ipn: true,
            ipn_verify_url: url,
        }
    }

    #[test]
    fn test_parse_full_notification() {
        let notification = parse_notification(BODY.as_bytes());

        assert_eq!(notification.transaction_id, "T1");
        assert_eq!(notification.payer_email, "a@x.com");
        assert_eq!(notification.company_name(), "Ada Lovelace");
        assert_eq!(notification.gross_amount.as_deref(), Some("10.00"));
        assert_eq!(notification.currency.as_deref(), Some("USD"));
        assert!(notification.is_completed());
    }

    #[test]
    fn test_parse_sparse_notification() {
        let notification = parse_notification(b"txn_id=T2&payment_status=Pending&mc_gross=");

        assert_eq!(notification.transaction_id, "T2");
        assert!(notification.payer_email.is_empty());
        assert_eq!(notification.gross_amount, None);
        assert!(!notification.is_completed());
    }

    #[test]
    fn test_disabled_verifier_from_config() {
        let verifier = IpnVerifier::new(&PayPalConfig::default());
        assert!(!verifier.is_enabled());
    }

    #[tokio::test]
    async fn test_postback_prefixes_validate_command() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/cgi-bin/webscr"))
            .and(body_string(format!("cmd=_notify-validate&{BODY}")))
            .respond_with(ResponseTemplate::new(200).set_body_string("VERIFIED"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let verifier =
            IpnVerifier::new(&enabled_config(format!("{}/cgi-bin/webscr", mock_server.uri())));
        verifier.verify(BODY.as_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_answer_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("INVALID"))
            .mount(&mock_server)
            .await;

        let verifier = IpnVerifier::new(&enabled_config(mock_server.uri()));
        match verifier.verify(BODY.as_bytes()).await {
            Err(IpnError::NotVerified(answer)) => assert_eq!(answer, "INVALID"),
            other => panic!("expected NotVerified, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_verifier_skips_postback() {
        IpnVerifier::disabled().verify(b"anything").await.unwrap();
    }
}
