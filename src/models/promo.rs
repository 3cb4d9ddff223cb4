use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromoKind {
    Percent,
    Flat,
}

impl PromoKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromoKind::Percent => "percent",
            PromoKind::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromoCode {
    pub kind: PromoKind,
    pub value: f64,
    /// Minimum qualifying amount; 0 means no minimum.
    pub min_amount: f64,
    pub description: String,
}

/// Static promo catalog, injected through `AppState` so tests can swap it.
#[derive(Debug, Clone, Default)]
pub struct PromoCatalog {
    codes: HashMap<String, PromoCode>,
}

impl PromoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(
        mut self,
        code: &str,
        kind: PromoKind,
        value: f64,
        min_amount: f64,
        description: &str,
    ) -> Self {
        self.codes.insert(
            code.to_uppercase(),
            PromoCode {
                kind,
                value,
                min_amount,
                description: description.to_string(),
            },
        );
        self
    }

    /// The catalog shipped with the service.
    pub fn builtin() -> Self {
        Self::new()
            .with_code(
                "SAVE10",
                PromoKind::Percent,
                10.0,
                500.0,
                "Get 10% off on orders above ₹500",
            )
            .with_code(
                "FLAT100",
                PromoKind::Flat,
                100.0,
                1000.0,
                "Get ₹100 off on orders above ₹1000",
            )
            .with_code(
                "WELCOME20",
                PromoKind::Percent,
                20.0,
                0.0,
                "Welcome offer - Get 20% off on your first booking",
            )
    }

    /// Lookup by already-normalized (upper-case) code.
    pub fn get(&self, code: &str) -> Option<&PromoCode> {
        self.codes.get(code)
    }

    /// All codes, sorted for stable listings.
    pub fn entries(&self) -> Vec<(&str, &PromoCode)> {
        let mut entries: Vec<_> = self
            .codes
            .iter()
            .map(|(code, promo)| (code.as_str(), promo))
            .collect();
        entries.sort_by_key(|(code, _)| *code);
        entries
    }
}
