use serde::{Deserialize, Serialize};

/// Company fundamentals used for the non-indicator dashboard columns.
///
/// Every field is optional: providers routinely omit metrics (no dividend, no
/// analyst coverage, negative earnings without a P/E).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub current_price: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub forward_pe: Option<f64>,
    pub enterprise_to_ebitda: Option<f64>,
    pub enterprise_to_revenue: Option<f64>,
    pub ebitda: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub market_cap: Option<f64>,
    pub forward_eps: Option<f64>,
    pub earnings_quarterly_growth: Option<f64>,
    pub target_mean_price: Option<f64>,
}

impl Fundamentals {
    /// Trailing P/E, falling back to forward P/E.
    pub fn pe_ratio(&self) -> Option<f64> {
        self.trailing_pe.or(self.forward_pe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pe_prefers_trailing() {
        let f = Fundamentals {
            trailing_pe: Some(30.0),
            forward_pe: Some(25.0),
            ..Fundamentals::default()
        };
        assert_eq!(f.pe_ratio(), Some(30.0));

        let f = Fundamentals {
            forward_pe: Some(25.0),
            ..Fundamentals::default()
        };
        assert_eq!(f.pe_ratio(), Some(25.0));
        assert_eq!(Fundamentals::default().pe_ratio(), None);
    }
}
