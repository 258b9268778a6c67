use serde::{Deserialize, Serialize};

/// Ledger totals shown on the dashboard (`/movimientos/estadisticas/resumen`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    #[serde(rename = "ingresos_totales")]
    pub total_income: f64,
    #[serde(rename = "egresos_totales")]
    pub total_expenses: f64,
    pub balance: f64,
    #[serde(rename = "total_movimientos")]
    pub transaction_count: u64,
}

impl Summary {
    pub fn is_negative(&self) -> bool {
        self.balance < 0.0
    }
}

/// Format an amount with thousands separators and two decimals, e.g. `$-1,234.50`.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("${}{}.{:02}", sign, grouped, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_parses_partial_payload() {
        let summary: Summary =
            serde_json::from_str(r#"{"ingresos_totales":1500.5,"balance":-20}"#).unwrap();
        assert_eq!(summary.total_income, 1500.5);
        assert_eq!(summary.total_expenses, 0.0);
        assert!(summary.is_negative());
        assert_eq!(summary.transaction_count, 0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0.0), "$0.00");
        assert_eq!(format_amount(1234.5), "$1,234.50");
        assert_eq!(format_amount(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_amount(-20.0), "$-20.00");
        assert_eq!(format_amount(999.999), "$1,000.00");
    }
}
