// src/transform/mod.rs

pub mod rates;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::EtlError;
use crate::table::{Field, FieldKind, ResultTable, Value};

pub use rates::ExchangeRates;

/// A derived currency column: `field = round2(source * rate[code])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyTarget {
    pub code: String,
    pub field: String,
}

impl CurrencyTarget {
    pub fn new(code: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformRule {
    /// Parse, divide by `divisor`, round, rename. Non-numeric text aborts.
    Rescale {
        field: String,
        renamed_to: String,
        divisor: f64,
    },
    /// Coerce to numbers (bad text becomes missing) and add one column per target.
    Currency {
        field: String,
        targets: Vec<CurrencyTarget>,
    },
}

impl TransformRule {
    pub fn needs_rates(&self) -> bool {
        matches!(self, TransformRule::Currency { .. })
    }
}

/// Round to 2 decimals, ties away from zero.
///
/// Intentionally not NumPy's ties-to-even: `round2(0.125) == 0.13`.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Strip thousands separators and surrounding whitespace, then parse.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn apply(table: &mut ResultTable, rule: &TransformRule, rates: Option<&ExchangeRates>) -> Result<()> {
    match rule {
        TransformRule::Rescale {
            field,
            renamed_to,
            divisor,
        } => rescale(table, field, renamed_to, *divisor),
        TransformRule::Currency { field, targets } => {
            let rates = rates.ok_or_else(|| {
                anyhow::anyhow!("currency transform needs an exchange-rate table")
            })?;
            convert_currency(table, field, rates, targets)
        }
    }
}

#[instrument(level = "info", skip(table), fields(rows = table.len()))]
pub fn rescale(table: &mut ResultTable, field: &str, renamed_to: &str, divisor: f64) -> Result<()> {
    if !table.has_field(field) && table.has_field(renamed_to) {
        return Err(EtlError::AlreadyTransformed(format!(
            "`{}` was already renamed to `{}`",
            field, renamed_to
        ))
        .into());
    }
    table.replace_field(field, Field::number(renamed_to), |row, v| match v {
        Value::Text(s) => parse_amount(s)
            .map(|x| Value::Number(round2(x / divisor)))
            .ok_or_else(|| {
                EtlError::Coercion {
                    row,
                    field: field.to_string(),
                    text: s.clone(),
                }
                .into()
            }),
        other => Err(EtlError::AlreadyTransformed(format!(
            "row {} of `{}` holds {:?}, not text",
            row, field, other
        ))
        .into()),
    })?;
    debug!(field = renamed_to, "rescaled");
    Ok(())
}

#[instrument(level = "info", skip(table, rates), fields(rows = table.len()))]
pub fn convert_currency(
    table: &mut ResultTable,
    field: &str,
    rates: &ExchangeRates,
    targets: &[CurrencyTarget],
) -> Result<()> {
    // validate everything up front so a failure leaves the table untouched
    let src = table.field_index(field)?;
    if let Some(t) = targets.iter().find(|t| table.has_field(&t.field)) {
        return Err(EtlError::AlreadyTransformed(format!("field `{}` already exists", t.field)).into());
    }
    let factors = targets
        .iter()
        .map(|t| rates.get(&t.code))
        .collect::<Result<Vec<_>>>()?;

    if table.fields()[src].kind == FieldKind::Text {
        table.replace_field(field, Field::number(field), |_, v| {
            Ok(match v {
                Value::Text(s) => parse_amount(s).map(Value::Number).unwrap_or(Value::Missing),
                other => other.clone(),
            })
        })?;
    }

    for (target, rate) in targets.iter().zip(factors) {
        table.derive_field(Field::number(&target.field), |row| match row[src] {
            Value::Number(usd) => Value::Number(round2(usd * rate)),
            _ => Value::Missing,
        })?;
        debug!(currency = %target.code, rate, "derived {}", target.field);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(field: &str, values: &[&str]) -> ResultTable {
        let mut t = ResultTable::with_text_fields(&["Name", field]);
        for (i, v) in values.iter().enumerate() {
            t.push_row(vec![Value::Text(format!("row{}", i)), Value::Text(v.to_string())])
                .unwrap();
        }
        t
    }

    fn sample_rates() -> ExchangeRates {
        ExchangeRates::from_pairs([("EUR", 0.93), ("GBP", 0.8), ("INR", 82.95)])
    }

    fn bank_targets() -> Vec<CurrencyTarget> {
        vec![
            CurrencyTarget::new("EUR", "MC_EUR_Billion"),
            CurrencyTarget::new("GBP", "MC_GBP_Billion"),
            CurrencyTarget::new("INR", "MC_INR_Billion"),
        ]
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
        assert_eq!(round2(26854.599), 26854.6);
        assert_eq!(round2(1.004), 1.0);
    }

    #[test]
    fn parse_amount_strips_separators() {
        assert_eq!(parse_amount("26,854,599"), Some(26854599.0));
        assert_eq!(parse_amount(" 432.92\n"), Some(432.92));
        assert_eq!(parse_amount("—"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn rescale_millions_to_billions() {
        let mut t = table("GDP_USD_millions", &["26,854,599", "4,409,738", "1,000"]);
        rescale(&mut t, "GDP_USD_millions", "GDP_USD_billions", 1000.0).unwrap();
        assert_eq!(t.field_names(), vec!["Name", "GDP_USD_billions"]);
        assert_eq!(t.fields()[1].kind, FieldKind::Number);
        let col: Vec<f64> = (0..t.len())
            .map(|i| t.get(i, "GDP_USD_billions").and_then(Value::as_f64).unwrap())
            .collect();
        assert_eq!(col, vec![26854.6, 4409.74, 1.0]);
    }

    #[test]
    fn rescale_aborts_on_non_numeric() {
        let mut t = table("GDP_USD_millions", &["1,000", "19,373,586 [n 1]"]);
        let err = rescale(&mut t, "GDP_USD_millions", "GDP_USD_billions", 1000.0).unwrap_err();
        match err.downcast_ref::<EtlError>() {
            Some(EtlError::Coercion { row, text, .. }) => {
                assert_eq!(*row, 1);
                assert_eq!(text, "19,373,586 [n 1]");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn failed_rescale_leaves_table_untouched() {
        let mut t = table("GDP_USD_millions", &["1,000", "bad"]);
        let before = t.clone();
        let err = rescale(&mut t, "GDP_USD_millions", "GDP_USD_billions", 1000.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::Coercion { row: 1, .. })
        ));
        assert_eq!(t, before);

        // a retry reports the same coercion failure, not a re-transform
        let err = rescale(&mut t, "GDP_USD_millions", "GDP_USD_billions", 1000.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::Coercion { row: 1, .. })
        ));
    }

    #[test]
    fn rescale_twice_is_rejected() {
        let mut t = table("GDP_USD_millions", &["1,000"]);
        rescale(&mut t, "GDP_USD_millions", "GDP_USD_billions", 1000.0).unwrap();
        let err = rescale(&mut t, "GDP_USD_millions", "GDP_USD_billions", 1000.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::AlreadyTransformed(_))
        ));
        assert_eq!(t.get(0, "GDP_USD_billions"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn currency_columns_from_usd() {
        let mut t = table("MC_USD_Billion", &["100.0", "432.92"]);
        convert_currency(&mut t, "MC_USD_Billion", &sample_rates(), &bank_targets()).unwrap();
        assert_eq!(
            t.field_names(),
            vec!["Name", "MC_USD_Billion", "MC_EUR_Billion", "MC_GBP_Billion", "MC_INR_Billion"]
        );
        assert_eq!(t.get(0, "MC_USD_Billion"), Some(&Value::Number(100.0)));
        assert_eq!(t.get(0, "MC_EUR_Billion"), Some(&Value::Number(93.0)));
        assert_eq!(t.get(0, "MC_GBP_Billion"), Some(&Value::Number(80.0)));
        assert_eq!(t.get(0, "MC_INR_Billion"), Some(&Value::Number(8295.0)));
        assert_eq!(t.get(1, "MC_EUR_Billion"), Some(&Value::Number(402.62)));
        assert_eq!(t.get(1, "MC_GBP_Billion"), Some(&Value::Number(346.34)));
        assert_eq!(t.get(1, "MC_INR_Billion"), Some(&Value::Number(35910.71)));
    }

    #[test]
    fn currency_coerces_bad_values_to_missing() {
        let mut t = table("MC_USD_Billion", &["n/a", "50"]);
        convert_currency(&mut t, "MC_USD_Billion", &sample_rates(), &bank_targets()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(0, "MC_USD_Billion"), Some(&Value::Missing));
        assert_eq!(t.get(0, "MC_INR_Billion"), Some(&Value::Missing));
        assert_eq!(t.get(1, "MC_GBP_Billion"), Some(&Value::Number(40.0)));
    }

    #[test]
    fn currency_needs_every_rate() {
        let mut t = table("MC_USD_Billion", &["1"]);
        let rates = ExchangeRates::from_pairs([("EUR", 0.93)]);
        assert!(convert_currency(&mut t, "MC_USD_Billion", &rates, &bank_targets()).is_err());
        // untouched
        assert_eq!(t.fields().len(), 2);
        assert_eq!(t.get(0, "MC_USD_Billion"), Some(&Value::Text("1".into())));
    }

    #[test]
    fn currency_twice_is_rejected() {
        let mut t = table("MC_USD_Billion", &["1"]);
        convert_currency(&mut t, "MC_USD_Billion", &sample_rates(), &bank_targets()).unwrap();
        let err =
            convert_currency(&mut t, "MC_USD_Billion", &sample_rates(), &bank_targets()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::AlreadyTransformed(_))
        ));
        assert_eq!(t.fields().len(), 5);
    }
}
