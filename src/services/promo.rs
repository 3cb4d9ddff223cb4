use crate::models::{PromoCatalog, PromoKind};

#[derive(Debug, Clone, PartialEq)]
pub enum PromoEvaluation {
    Applied {
        code: String,
        kind: PromoKind,
        value: f64,
        discount: f64,
    },
    UnknownCode,
    MinimumNotMet {
        min_amount: f64,
    },
}

/// Evaluate a promo code against an amount. Pure: same inputs, same outcome,
/// for both the preview endpoint and the booking transaction.
pub fn evaluate(catalog: &PromoCatalog, code: &str, amount: f64) -> PromoEvaluation {
    let normalized = code.trim().to_uppercase();

    let Some(promo) = catalog.get(&normalized) else {
        return PromoEvaluation::UnknownCode;
    };

    if promo.min_amount > 0.0 && amount < promo.min_amount {
        return PromoEvaluation::MinimumNotMet {
            min_amount: promo.min_amount,
        };
    }

    let raw = match promo.kind {
        PromoKind::Percent => amount * promo.value / 100.0,
        PromoKind::Flat => promo.value,
    };
    // Clamp so the final price never goes negative, then round to cents.
    let discount = round2(raw.min(amount));

    PromoEvaluation::Applied {
        code: normalized,
        kind: promo.kind,
        value: promo.value,
        discount,
    }
}

pub fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
