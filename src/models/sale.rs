use serde::{Deserialize, Serialize};

/// Public sale record for a token. Reference data, fixed per deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenSale {
    pub token_id: String,
    pub funds_raised_usd: f64,
    pub participants: u32,
    pub contract_address: Option<String>,
    pub network: Option<String>,
    #[serde(default)]
    pub sale_date: Option<String>,
}

impl TokenSale {
    /// Average allocation per participant in USD.
    pub fn average_allocation_usd(&self) -> Option<f64> {
        if self.participants == 0 {
            return None;
        }
        Some(self.funds_raised_usd / self.participants as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_allocation() {
        let sale = TokenSale {
            token_id: "fuel".to_string(),
            funds_raised_usd: 1_000_000.0,
            participants: 2_000,
            contract_address: None,
            network: Some("Ethereum".to_string()),
            sale_date: None,
        };
        assert_eq!(sale.average_allocation_usd(), Some(500.0));

        let empty = TokenSale { participants: 0, ..sale };
        assert!(empty.average_allocation_usd().is_none());
    }
}
