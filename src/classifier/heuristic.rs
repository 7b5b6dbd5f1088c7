//! Offline classifier for local development without an API key.
//!
//! Scans each payload field for the same markers the keyword rules look
//! for and writes a short findings report, so the verdict is derived the
//! same way as for a hosted model.

use async_trait::async_trait;

use super::{Classification, Classifier, ClassifierError, Payload, render_value};

const FAIL_MARKERS: &[&str] = &["credential", "secret", "password", "private key"];
const RISK_MARKERS: &[&str] = &["permission", "sudo", "curl | sh", "chmod 777"];

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

#[async_trait]
impl Classifier for HeuristicClassifier {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn analyze(&self, payload: &Payload) -> Result<Classification, ClassifierError> {
        let mut findings = Vec::new();

        for (key, value) in payload {
            let text = format!("{key} {}", render_value(value)).to_lowercase();

            if let Some(marker) = FAIL_MARKERS.iter().find(|marker| text.contains(*marker)) {
                findings.push(format!("- {key}: possible secret exposure ({marker})"));
            } else if let Some(marker) = RISK_MARKERS.iter().find(|marker| text.contains(*marker)) {
                findings.push(format!("- {key}: elevated permission risk ({marker})"));
            }
        }

        let analysis = if findings.is_empty() {
            format!("No findings across {} payload fields.", payload.len())
        } else {
            format!("Findings:\n{}", findings.join("\n"))
        };

        Ok(Classification::from_analysis(analysis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierStatus;
    use serde_json::json;

    fn payload(entries: &[(&str, serde_json::Value)]) -> Payload {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_clean_payload_is_ok() {
        let result = HeuristicClassifier
            .analyze(&payload(&[("steps", json!(["cargo build", "cargo test"]))]))
            .await
            .unwrap();

        assert_eq!(result.status, ClassifierStatus::Ok);
        assert!(result.analysis.contains("1 payload fields"));
    }

    #[tokio::test]
    async fn test_password_in_env_fails() {
        let result = HeuristicClassifier
            .analyze(&payload(&[("env", json!({"DB_PASSWORD": "hunter2"}))]))
            .await
            .unwrap();

        assert_eq!(result.status, ClassifierStatus::Fail);
        assert!(result.analysis.contains("env"));
    }

    #[tokio::test]
    async fn test_sudo_is_flagged_as_risk() {
        let result = HeuristicClassifier
            .analyze(&payload(&[("script", json!("sudo make install"))]))
            .await
            .unwrap();

        assert_eq!(result.status, ClassifierStatus::Risk);
    }
}
