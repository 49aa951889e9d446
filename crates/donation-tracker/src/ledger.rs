//! Per-currency amount accumulation
//!
//! Donations arrive in several currencies and are never converted until the
//! very end, so every amount is kept in a map keyed by currency code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::constants::{EUR, USD};

/// Currency code to accumulated amount
///
/// A currency only appears once something was added for it. Reading a
/// currency that never appeared yields zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyLedger(BTreeMap<String, f64>);

impl CurrencyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount to a currency in place
    pub fn add(&mut self, currency: &str, amount: f64) {
        *self.0.entry(currency.to_string()).or_insert(0.0) += amount;
    }

    /// Amount held for a currency, zero when absent
    pub fn get(&self, currency: &str) -> f64 {
        self.0.get(currency).copied().unwrap_or(0.0)
    }

    /// Union of two ledgers with per-currency sums
    pub fn merge(&self, other: &CurrencyLedger) -> CurrencyLedger {
        let mut result = self.clone();
        for (currency, amount) in &other.0 {
            result.add(currency, *amount);
        }
        result
    }

    /// USD plus EUR converted at `eur_to_usd_rate`.
    ///
    /// Other currencies do not contribute; see `unconverted_currencies`.
    pub fn grand_total(&self, eur_to_usd_rate: f64) -> f64 {
        self.get(USD) + self.get(EUR) * eur_to_usd_rate
    }

    /// Currencies with a nonzero amount that `grand_total` leaves out
    pub fn unconverted_currencies(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(currency, amount)| {
                currency.as_str() != USD && currency.as_str() != EUR && **amount != 0.0
            })
            .map(|(currency, _)| currency.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(c, a)| (c.as_str(), *a))
    }
}

impl<'a> FromIterator<(&'a str, f64)> for CurrencyLedger {
    fn from_iter<I: IntoIterator<Item = (&'a str, f64)>>(iter: I) -> Self {
        let mut ledger = CurrencyLedger::new();
        for (currency, amount) in iter {
            ledger.add(currency, amount);
        }
        ledger
    }
}

impl fmt::Display for CurrencyLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "[{}: 0.00]", USD);
        }

        let parts: Vec<String> = self
            .iter()
            .map(|(currency, amount)| format!("{}: {:.2}", currency, amount))
            .collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EUR_TO_USD: f64 = 1.25;

    fn approx_eq(a: &CurrencyLedger, b: &CurrencyLedger) -> bool {
        a.0.len() == b.0.len()
            && a
                .0
                .iter()
                .all(|(currency, amount)| (b.get(currency) - amount).abs() < 1e-6)
    }

    fn ledger_strategy() -> impl Strategy<Value = CurrencyLedger> {
        prop::collection::btree_map(
            prop::sample::select(vec!["USD", "EUR", "GBP"]),
            -1_000_000i64..1_000_000i64,
            0..3,
        )
        .prop_map(|cents| {
            cents
                .into_iter()
                .map(|(currency, c)| (currency, c as f64 / 100.0))
                .collect()
        })
    }

    #[test]
    fn test_add_with_all_currencies() {
        let a: CurrencyLedger = [("USD", 12.34), ("EUR", 10.00)].into_iter().collect();
        let b: CurrencyLedger = [("USD", 23.45), ("EUR", 20.00)].into_iter().collect();

        let result = a.merge(&b);

        assert!((result.get("USD") - 35.79).abs() < 1e-9);
        assert!((result.get("EUR") - 30.00).abs() < 1e-9);
    }

    #[test]
    fn test_merge_with_some_missing_currencies() {
        let a: CurrencyLedger = [("EUR", 10.00)].into_iter().collect();
        let b: CurrencyLedger = [("USD", 23.45)].into_iter().collect();

        let result = a.merge(&b);

        assert_eq!(result.get("USD"), 23.45);
        assert_eq!(result.get("EUR"), 10.00);
        assert_eq!(result, b.merge(&a));
    }

    #[test]
    fn test_merge_does_not_mutate_operands() {
        let a: CurrencyLedger = [("USD", 1.0)].into_iter().collect();
        let b: CurrencyLedger = [("USD", 2.0)].into_iter().collect();
        let _ = a.merge(&b);
        assert_eq!(a.get("USD"), 1.0);
        assert_eq!(b.get("USD"), 2.0);
    }

    #[test]
    fn test_grand_total_with_empty_ledger() {
        let ledger = CurrencyLedger::new();
        assert_eq!(ledger.grand_total(EUR_TO_USD), 0.0);
        assert_eq!(ledger.grand_total(0.9), 0.0);
    }

    #[test]
    fn test_grand_total_with_just_usd() {
        let ledger: CurrencyLedger = [("USD", 34.56)].into_iter().collect();
        assert_eq!(ledger.grand_total(EUR_TO_USD), 34.56);
    }

    #[test]
    fn test_grand_total_with_usd_and_eur() {
        let ledger: CurrencyLedger = [("USD", 34.56), ("EUR", 10.00)].into_iter().collect();
        assert!((ledger.grand_total(EUR_TO_USD) - 47.06).abs() < 1e-9);
    }

    #[test]
    fn test_grand_total_ignores_other_currencies() {
        let ledger: CurrencyLedger = [("USD", 5.0), ("GBP", 100.0)].into_iter().collect();
        assert_eq!(ledger.grand_total(EUR_TO_USD), 5.0);
        assert_eq!(ledger.unconverted_currencies(), vec!["GBP"]);
    }

    #[test]
    fn test_display() {
        let ledger: CurrencyLedger = [("USD", 5.0), ("EUR", 2.5)].into_iter().collect();
        assert_eq!(ledger.to_string(), "[EUR: 2.50, USD: 5.00]");
        assert_eq!(CurrencyLedger::new().to_string(), "[USD: 0.00]");
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let ledger: CurrencyLedger = [("USD", 5.0)].into_iter().collect();
        assert_eq!(serde_json::to_string(&ledger).unwrap(), r#"{"USD":5.0}"#);
    }

    proptest! {
        #[test]
        fn test_merge_is_commutative(a in ledger_strategy(), b in ledger_strategy()) {
            prop_assert_eq!(a.merge(&b), b.merge(&a));
        }

        #[test]
        fn test_merge_is_associative(
            a in ledger_strategy(),
            b in ledger_strategy(),
            c in ledger_strategy(),
        ) {
            prop_assert!(approx_eq(&a.merge(&b).merge(&c), &a.merge(&b.merge(&c))));
        }

        #[test]
        fn test_empty_ledger_is_identity(a in ledger_strategy()) {
            prop_assert_eq!(a.merge(&CurrencyLedger::new()), a.clone());
            prop_assert_eq!(CurrencyLedger::new().merge(&a), a);
        }

        #[test]
        fn test_merge_matches_manual_sums(a in ledger_strategy(), b in ledger_strategy()) {
            let merged = a.merge(&b);
            for currency in ["USD", "EUR", "GBP"] {
                prop_assert!((merged.get(currency) - (a.get(currency) + b.get(currency))).abs() < 1e-6);
            }
        }

        #[test]
        fn test_grand_total_is_linear_in_rate(a in ledger_strategy(), rate in 0.01f64..10.0) {
            let expected = a.get("USD") + a.get("EUR") * rate;
            prop_assert!((a.grand_total(rate) - expected).abs() < 1e-9);
        }
    }
}
