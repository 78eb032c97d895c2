//! Last-known prices bundled with the build, served when every other tier fails.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref LAST_KNOWN_PRICES: HashMap<&'static str, f64> = {
        let mut m = HashMap::new();
        m.insert("fuel-network", 0.05);
        m.insert("silencio", 0.000_42);
        m.insert("nexera", 0.0065);
        m.insert("almanak", 0.021);
        m.insert("giza", 0.19);
        m.insert("hyperlane", 0.32);
        m
    };
}

pub fn last_known_price(coin_id: &str) -> Option<f64> {
    LAST_KNOWN_PRICES.get(coin_id).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_ids() {
        assert_eq!(last_known_price("fuel-network"), Some(0.05));
        assert_eq!(last_known_price("not-a-coin"), None);
    }
}
