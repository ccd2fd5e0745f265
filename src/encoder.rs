//! Validation and encoding of raw customer input into the model's feature vector.

use serde::Serialize;

use crate::error::ValidationError;
use crate::record::{
    Category, Color, Column, CustomerRecord, Frequency, MAX_AGE, MAX_REVIEW_RATING,
    MIN_REVIEW_RATING, RawCustomerInput, Season,
};

/// Escape character of the persisted CSV table.
pub(crate) const ESCAPE: char = '\\';

/// Columns the inference pipeline reads, in validation order.
pub const MODEL_INPUTS: [Column; 8] = [
    Column::Age,
    Column::PurchaseAmount,
    Column::ReviewRating,
    Column::PreviousPurchases,
    Column::Category,
    Column::Color,
    Column::Season,
    Column::Frequency,
];

/// The fixed feature vector handed to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub age: f64,
    pub purchase_amount: f64,
    pub review_rating: f64,
    pub previous_purchases: f64,
    pub category: Category,
    pub color: Color,
    pub season: Season,
    pub frequency: Frequency,
}

impl FeatureVector {
    /// Numeric feature value, or `None` if `column` is not a numeric model input.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Age => Some(self.age),
            Column::PurchaseAmount => Some(self.purchase_amount),
            Column::ReviewRating => Some(self.review_rating),
            Column::PreviousPurchases => Some(self.previous_purchases),
            _ => None,
        }
    }

    /// Categorical feature value, or `None` if `column` is not a categorical model input.
    pub fn categorical(&self, column: Column) -> Option<&'static str> {
        match column {
            Column::Category => Some(self.category.as_str()),
            Column::Color => Some(self.color.as_str()),
            Column::Season => Some(self.season.as_str()),
            Column::Frequency => Some(self.frequency.as_str()),
            _ => None,
        }
    }
}

impl From<&CustomerRecord> for FeatureVector {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            age: record.age as f64,
            purchase_amount: record.purchase_amount,
            review_rating: record.review_rating,
            previous_purchases: record.previous_purchases as f64,
            category: record.category,
            color: record.color,
            season: record.season,
            frequency: record.frequency,
        }
    }
}

/// Stateless validator/encoder. All-or-nothing: the first violation fails the call.
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Checks every field of `raw` against its domain and bound.
    pub fn validate(raw: &RawCustomerInput) -> Result<CustomerRecord, ValidationError> {
        if !(0..=MAX_AGE).contains(&raw.age) {
            return Err(ValidationError::new(
                "Age",
                format!("{} is outside 0..={}", raw.age, MAX_AGE),
            ));
        }
        if !raw.purchase_amount.is_finite() || raw.purchase_amount < 0.0 {
            return Err(ValidationError::new(
                "Purchase Amount (USD)",
                format!("{} is not a non-negative amount", raw.purchase_amount),
            ));
        }
        if !(MIN_REVIEW_RATING..=MAX_REVIEW_RATING).contains(&raw.review_rating) {
            return Err(ValidationError::new(
                "Review Rating",
                format!(
                    "{} is outside {}..={}",
                    raw.review_rating, MIN_REVIEW_RATING, MAX_REVIEW_RATING
                ),
            ));
        }
        let previous_purchases = u32::try_from(raw.previous_purchases).map_err(|_| {
            ValidationError::new(
                "Previous Purchases",
                format!("{} is not a non-negative count", raw.previous_purchases),
            )
        })?;

        Ok(CustomerRecord {
            age: raw.age as u32,
            purchase_amount: raw.purchase_amount,
            review_rating: raw.review_rating,
            previous_purchases,
            category: raw.category.parse()?,
            color: raw.color.parse()?,
            season: raw.season.parse()?,
            frequency: raw.frequency.parse()?,
            gender: optional_text("Gender", &raw.gender)?,
            location: optional_text("Location", &raw.location)?,
            item_purchased: optional_text("Item Purchased", &raw.item_purchased)?,
            preferred_payment_method: optional_text(
                "Preferred Payment Method",
                &raw.preferred_payment_method,
            )?,
        })
    }

    /// Validates `raw` and produces the model's feature vector.
    pub fn encode(raw: &RawCustomerInput) -> Result<FeatureVector, ValidationError> {
        Self::validate(raw).map(|record| FeatureVector::from(&record))
    }
}

/// Trims free text; blank becomes `None`. Text containing the dataset's CSV
/// escape character is rejected, since the table could not read it back.
fn optional_text(
    field: &'static str,
    value: &Option<String>,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if text.contains(ESCAPE) {
        return Err(ValidationError::new(
            field,
            format!("`{text}` contains the reserved character `{ESCAPE}`"),
        ));
    }
    Ok(Some(text.to_string()))
}
