use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{DashboardStats, NetworkStatus, WalletType};
use crate::sync::SyncReport;

pub const MAX_LABEL_LEN: usize = 100;

// ============================================================
// Errors
// ============================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ============================================================
// Requests
// ============================================================

/// Fields are optional so that missing values surface as validation
/// details rather than a body rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub address: Option<String>,
    pub label: Option<String>,
    pub wallet_type: Option<String>,
}

#[derive(Debug)]
pub struct ValidWallet {
    pub address: String,
    pub label: String,
    pub wallet_type: WalletType,
}

impl CreateWalletRequest {
    pub fn validate(self) -> Result<ValidWallet, Vec<FieldError>> {
        let mut errors = Vec::new();

        let address = match self.address {
            Some(a) if is_hex_address(&a) => Some(a),
            Some(_) => {
                errors.push(FieldError::new("address", "Invalid Ethereum address format"));
                None
            }
            None => {
                errors.push(FieldError::new("address", "Required"));
                None
            }
        };

        let label = match self.label {
            Some(l) => validate_label(&l).map_err(|e| errors.push(e)).ok().map(|_| l),
            None => {
                errors.push(FieldError::new("label", "Required"));
                None
            }
        };

        let wallet_type = match self.wallet_type {
            Some(t) => parse_wallet_type(&t).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push(FieldError::new("walletType", "Required"));
                None
            }
        };

        match (address, label, wallet_type) {
            (Some(address), Some(label), Some(wallet_type)) if errors.is_empty() => Ok(ValidWallet {
                address,
                label,
                wallet_type,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    pub label: Option<String>,
    pub wallet_type: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateWalletRequest {
    pub fn validate(&self) -> Result<Option<WalletType>, Vec<FieldError>> {
        let mut errors = Vec::new();

        if let Some(label) = &self.label {
            if let Err(e) = validate_label(label) {
                errors.push(e);
            }
        }
        let wallet_type = match &self.wallet_type {
            Some(t) => parse_wallet_type(t).map_err(|e| errors.push(e)).ok(),
            None => None,
        };

        if errors.is_empty() {
            Ok(wallet_type)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub wallet_id: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ChartParams {
    pub timeframe: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub wallet_id: Option<String>,
}

// ============================================================
// Responses
// ============================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    #[serde(flatten)]
    pub stats: DashboardStats,
    pub network: NetworkStatus,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub report: SyncReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatusResponse {
    pub current_era: i64,
    pub current_block: i64,
    pub block_timestamp: DateTime<Utc>,
    pub chain_id: u64,
    pub ztc_price: f64,
}

// ============================================================
// Validation helpers
// ============================================================

/// `^0x[a-fA-F0-9]{40}$`
pub fn is_hex_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(hex) => hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

fn validate_label(label: &str) -> Result<(), FieldError> {
    if label.is_empty() {
        return Err(FieldError::new("label", "Label must not be empty"));
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(FieldError::new(
            "label",
            format!("Label must be at most {} characters", MAX_LABEL_LEN),
        ));
    }
    Ok(())
}

fn parse_wallet_type(value: &str) -> Result<WalletType, FieldError> {
    value
        .parse()
        .map_err(|_| FieldError::new("walletType", "Expected one of: staking, validator, both"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(address: &str, label: &str, wallet_type: &str) -> CreateWalletRequest {
        CreateWalletRequest {
            address: Some(address.to_string()),
            label: Some(label.to_string()),
            wallet_type: Some(wallet_type.to_string()),
        }
    }

    #[test]
    fn test_is_hex_address() {
        assert!(is_hex_address("0x742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67e"));
        assert!(is_hex_address("0x0000000000000000000000000000000000000000"));
        assert!(!is_hex_address("0xnotavalidaddress"));
        assert!(!is_hex_address("742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67e"));
        assert!(!is_hex_address("0X742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67e"));
        assert!(!is_hex_address("0x742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67"));
    }

    #[test]
    fn test_valid_create_request() {
        let valid = request("0x742d35Cc6634C0532925a3b8D3Ac19C7C1C3a67e", "Main", "staking")
            .validate()
            .unwrap();
        assert_eq!(valid.label, "Main");
        assert_eq!(valid.wallet_type, WalletType::Staking);
    }

    #[test]
    fn test_create_request_collects_all_field_errors() {
        let long_label = "x".repeat(MAX_LABEL_LEN + 1);
        let errors = request("0xnotavalidaddress", &long_label, "delegator")
            .validate()
            .unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["address", "label", "walletType"]);
    }

    #[test]
    fn test_create_request_missing_fields() {
        let errors = CreateWalletRequest {
            address: None,
            label: Some(String::new()),
            wallet_type: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].message, "Required");
        assert_eq!(errors[1].field, "label");
    }

    #[test]
    fn test_update_request_validation() {
        let ok = UpdateWalletRequest {
            wallet_type: Some("both".to_string()),
            ..Default::default()
        };
        assert_eq!(ok.validate().unwrap(), Some(WalletType::Both));

        let bad = UpdateWalletRequest {
            label: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(bad.validate().unwrap_err()[0].field, "label");

        assert_eq!(UpdateWalletRequest::default().validate().unwrap(), None);
    }
}
