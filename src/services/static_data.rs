//! Token and sale data bundled with the build.
//!
//! Served whenever the remote store is unconfigured, unreachable or empty.

use lazy_static::lazy_static;

use crate::models::token::{investment_value, roi_percent};
use crate::models::{Token, TokenLinks, TokenSale, TokenStatus, VestingSchedule};

#[allow(clippy::too_many_arguments)]
fn token(
    id: &str,
    name: &str,
    symbol: &str,
    status: TokenStatus,
    launch_date: &str,
    seed_price: f64,
    live_price: Option<f64>,
    coingecko_id: Option<&str>,
    vesting: Option<(&str, VestingSchedule)>,
    website: &str,
) -> Token {
    Token {
        id: id.to_string(),
        name: name.to_string(),
        symbol: symbol.to_string(),
        status,
        launch_date: launch_date.to_string(),
        seed_price,
        live_price,
        roi_percent: live_price.and_then(|p| roi_percent(seed_price, p)),
        investment_value: live_price.and_then(|p| investment_value(seed_price, p)),
        vesting: vesting.map(|(text, _)| text.to_string()),
        vesting_schedule: vesting.map(|(_, schedule)| schedule),
        links: Some(TokenLinks {
            website: Some(website.to_string()),
            ..Default::default()
        }),
        coingecko_id: coingecko_id.map(str::to_string),
        price_updated_at: None,
    }
}

fn schedule(tge_unlock_percent: f64, cliff_months: u32, vesting_months: u32) -> VestingSchedule {
    VestingSchedule {
        tge_unlock_percent,
        cliff_months,
        vesting_months,
    }
}

lazy_static! {
    pub static ref STATIC_TOKENS: Vec<Token> = vec![
        token(
            "fuel",
            "Fuel Network",
            "FUEL",
            TokenStatus::Live,
            "2024-12-18",
            0.02,
            Some(0.05),
            Some("fuel-network"),
            Some(("10% at TGE, 3 month cliff, 12 month linear", schedule(10.0, 3, 12))),
            "https://fuel.network",
        ),
        token(
            "silencio",
            "Silencio",
            "SLC",
            TokenStatus::LiveVested,
            "2025-01-23",
            0.0008,
            None,
            Some("silencio"),
            Some(("25% at TGE, 6 month linear", schedule(25.0, 0, 6))),
            "https://www.silencio.network",
        ),
        token(
            "nexera",
            "Nexera",
            "NXRA",
            TokenStatus::Live,
            "2024-10-08",
            0.04,
            None,
            Some("nexera"),
            Some(("100% at TGE", schedule(100.0, 0, 0))),
            "https://nexera.network",
        ),
        token(
            "almanak",
            "Almanak",
            "ALMANAK",
            TokenStatus::PendingTge,
            "TBD",
            0.015,
            None,
            Some("almanak"),
            Some(("20% at TGE, 1 month cliff, 9 month linear", schedule(20.0, 1, 9))),
            "https://almanak.co",
        ),
        token(
            "giza",
            "GIZA",
            "GIZA",
            TokenStatus::Live,
            "2025-02-05",
            0.08,
            None,
            Some("giza"),
            None,
            "https://www.gizatech.xyz",
        ),
        token(
            "hyperlane",
            "Hyperlane",
            "HYPER",
            TokenStatus::IcoSoon,
            "TBD",
            0.25,
            None,
            Some("hyperlane"),
            None,
            "https://hyperlane.xyz",
        ),
        token(
            "nodeops",
            "NodeOps",
            "NODE",
            TokenStatus::Cancelled,
            "TBD",
            0.06,
            None,
            None,
            None,
            "https://nodeops.network",
        ),
    ];

    pub static ref STATIC_SALES: Vec<TokenSale> = vec![
        TokenSale {
            token_id: "fuel".to_string(),
            funds_raised_usd: 1_050_000.0,
            participants: 3_410,
            contract_address: Some("0x675B68AA4d9c2d3BB3F0397048e62E6B7192079c".to_string()),
            network: Some("Ethereum".to_string()),
            sale_date: Some("2024-11-26".to_string()),
        },
        TokenSale {
            token_id: "silencio".to_string(),
            funds_raised_usd: 2_500_000.0,
            participants: 5_120,
            contract_address: None,
            network: Some("peaq".to_string()),
            sale_date: Some("2024-12-17".to_string()),
        },
        TokenSale {
            token_id: "nexera".to_string(),
            funds_raised_usd: 500_000.0,
            participants: 1_830,
            contract_address: None,
            network: Some("Ethereum".to_string()),
            sale_date: Some("2024-09-24".to_string()),
        },
        TokenSale {
            token_id: "almanak".to_string(),
            funds_raised_usd: 1_750_000.0,
            participants: 2_960,
            contract_address: None,
            network: Some("Base".to_string()),
            sale_date: Some("2025-01-14".to_string()),
        },
        TokenSale {
            token_id: "giza".to_string(),
            funds_raised_usd: 1_000_000.0,
            participants: 2_240,
            contract_address: None,
            network: Some("Base".to_string()),
            sale_date: Some("2025-01-21".to_string()),
        },
    ];
}

pub fn static_token(id: &str) -> Option<Token> {
    STATIC_TOKENS.iter().find(|t| t.id == id).cloned()
}

pub fn static_sale(token_id: &str) -> Option<TokenSale> {
    STATIC_SALES.iter().find(|s| s.token_id == token_id).cloned()
}
