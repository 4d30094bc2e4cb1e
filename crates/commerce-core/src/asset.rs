use crate::error::CoreError;
use crate::types::Chain;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Symbol -> decimals + chain metadata for a settlement asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub decimals: u8,
    pub chain: Chain,
}

/// Immutable lookup table, canonicalised to upper-case symbols.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: HashMap<String, Asset>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, symbol: &str, decimals: u8, chain: Chain) {
        let key = symbol.to_ascii_uppercase();
        self.assets.insert(
            key.clone(),
            Asset {
                symbol: key,
                decimals,
                chain,
            },
        );
    }

    pub fn lookup(&self, symbol: &str) -> Result<&Asset, CoreError> {
        self.assets
            .get(&symbol.to_ascii_uppercase())
            .ok_or_else(|| CoreError::UnknownAsset(symbol.to_string()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.assets.contains_key(&symbol.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut reg = AssetRegistry::new();
        reg.register("usdc", 6, Chain::Evm);
        assert!(reg.lookup("USDC").is_ok());
        assert!(reg.lookup("UsDc").is_ok());
    }

    #[test]
    fn unknown_symbol_errors() {
        let reg = AssetRegistry::new();
        assert!(matches!(reg.lookup("ZZZ"), Err(CoreError::UnknownAsset(_))));
    }
}
