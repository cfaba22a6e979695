use serde::{Deserialize, Serialize};

const BASE_RATE_PER_SQFT: f64 = 0.15;

/// Price estimate for a qualified job. Computed, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteEstimate {
    pub job_type: String,
    pub square_footage: f64,
    pub estimated_price: f64,
}

/// Flat-rate estimate: square footage times the base rate, rounded to
/// cents. Missing job type defaults to "general service"; missing square
/// footage defaults to zero and yields a $0 quote.
pub fn estimate_quote(job_type: Option<String>, square_footage: Option<f64>) -> QuoteEstimate {
    let job_type = job_type
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "general service".to_string());
    let square_footage = square_footage.unwrap_or(0.0);
    let estimated_price = (square_footage * BASE_RATE_PER_SQFT * 100.0).round() / 100.0;

    QuoteEstimate { job_type, square_footage, estimated_price }
}

/// Render a dollar amount with at least one decimal digit and no trailing
/// zeros beyond it: 180.0 -> "180.0", 22.13 -> "22.13".
pub fn format_dollars(amount: f64) -> String {
    let mut rendered = format!("{amount:.2}");
    while rendered.ends_with('0') && !rendered.ends_with(".0") {
        rendered.pop();
    }
    rendered
}
