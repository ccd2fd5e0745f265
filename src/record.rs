//! Customer record types, their enum domains, and the persisted column schema.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Declares a closed set of labels with exact spellings, plus accepted aliases.
macro_rules! domain_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $text:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Canonical spelling, as stored in the dataset.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Exact-spelling lookup; aliases map onto their canonical member.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text $(| $alias)* => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Canonical spellings of every member, in declaration order.
            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s).ok_or_else(|| {
                    ValidationError::new(
                        $field,
                        format!("`{}` is not one of: {}", s, Self::names().join(", ")),
                    )
                })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

domain_enum! {
    /// Product category of the purchase.
    Category, "Category" {
        Clothing => "Clothing",
        Footwear => "Footwear",
        Outerwear => "Outerwear",
        Accessories => "Accessories",
    }
}

domain_enum! {
    /// Color of the purchased item.
    Color, "Color" {
        Gray => "Gray",
        Maroon => "Maroon",
        Turquoise => "Turquoise",
        White => "White",
        Charcoal => "Charcoal",
        Silver => "Silver",
        Pink => "Pink",
        Purple => "Purple",
        Olive => "Olive",
        Gold => "Gold",
        Violet => "Violet",
        Teal => "Teal",
        Lavender => "Lavender",
        Black => "Black",
        Green => "Green",
        Peach => "Peach",
        Red => "Red",
        Cyan => "Cyan",
        Brown => "Brown",
        Beige => "Beige",
        Orange => "Orange",
        Indigo => "Indigo",
        Yellow => "Yellow",
        Magenta => "Magenta",
        Blue => "Blue",
    }
}

domain_enum! {
    /// Season of the purchase. Declaration order is the natural calendar order.
    Season, "Season" {
        Spring => "Spring",
        Summer => "Summer",
        Fall => "Fall" | "Autumn",
        Winter => "Winter",
    }
}

domain_enum! {
    /// Purchase cadence label.
    Frequency, "Frequency of Purchases" {
        Weekly => "Weekly",
        BiWeekly => "Bi-Weekly",
        Fortnightly => "Fortnightly",
        Monthly => "Monthly",
        Quarterly => "Quarterly",
        EveryThreeMonths => "Every 3 Months",
        Annually => "Annually" | "Yearly",
    }
}

pub const MAX_AGE: i64 = 120;
pub const MIN_REVIEW_RATING: f64 = 1.0;
pub const MAX_REVIEW_RATING: f64 = 5.0;

/// A named column of the persisted customer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Age,
    Gender,
    ItemPurchased,
    Category,
    PurchaseAmount,
    Location,
    Color,
    Season,
    ReviewRating,
    PreviousPurchases,
    PreferredPaymentMethod,
    Frequency,
    Cluster,
}

impl Column {
    /// Canonical column order of a freshly created table (after the index column).
    pub const SCHEMA: [Column; 13] = [
        Column::Age,
        Column::Gender,
        Column::ItemPurchased,
        Column::Category,
        Column::PurchaseAmount,
        Column::Location,
        Column::Color,
        Column::Season,
        Column::ReviewRating,
        Column::PreviousPurchases,
        Column::PreferredPaymentMethod,
        Column::Frequency,
        Column::Cluster,
    ];

    pub const NUMERIC: [Column; 4] = [
        Column::Age,
        Column::PurchaseAmount,
        Column::ReviewRating,
        Column::PreviousPurchases,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Age => "Age",
            Column::Gender => "Gender",
            Column::ItemPurchased => "Item Purchased",
            Column::Category => "Category",
            Column::PurchaseAmount => "Purchase Amount (USD)",
            Column::Location => "Location",
            Column::Color => "Color",
            Column::Season => "Season",
            Column::ReviewRating => "Review Rating",
            Column::PreviousPurchases => "Previous Purchases",
            Column::PreferredPaymentMethod => "Preferred Payment Method",
            Column::Frequency => "Frequency of Purchases",
            Column::Cluster => "Cluster",
        }
    }

    pub fn from_header(name: &str) -> Option<Self> {
        Self::SCHEMA.into_iter().find(|c| c.header() == name)
    }

    pub fn is_numeric(self) -> bool {
        Self::NUMERIC.contains(&self)
    }

    /// Fixed category ordering for enum-backed columns, if the column has one.
    pub fn domain(self) -> Option<Vec<&'static str>> {
        match self {
            Column::Category => Some(Category::names()),
            Column::Color => Some(Color::names()),
            Column::Season => Some(Season::names()),
            Column::Frequency => Some(Frequency::names()),
            _ => None,
        }
    }

    /// Maps a raw cell onto the canonical spelling of an enum-backed column.
    pub(crate) fn canonicalize(self, value: &str) -> Option<&'static str> {
        match self {
            Column::Category => Category::parse(value).map(Category::as_str),
            Column::Color => Color::parse(value).map(Color::as_str),
            Column::Season => Season::parse(value).map(Season::as_str),
            Column::Frequency => Frequency::parse(value).map(Frequency::as_str),
            _ => None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.header())
    }
}

/// Unvalidated customer input, as supplied by the form layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCustomerInput {
    pub age: i64,
    pub purchase_amount: f64,
    pub review_rating: f64,
    pub previous_purchases: i64,
    pub category: String,
    pub color: String,
    pub season: String,
    pub frequency: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub item_purchased: Option<String>,
    #[serde(default)]
    pub preferred_payment_method: Option<String>,
}

/// A validated customer record. Only obtainable through
/// [`FeatureEncoder::validate`](crate::encoder::FeatureEncoder::validate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerRecord {
    pub(crate) age: u32,
    pub(crate) purchase_amount: f64,
    pub(crate) review_rating: f64,
    pub(crate) previous_purchases: u32,
    pub(crate) category: Category,
    pub(crate) color: Color,
    pub(crate) season: Season,
    pub(crate) frequency: Frequency,
    pub(crate) gender: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) item_purchased: Option<String>,
    pub(crate) preferred_payment_method: Option<String>,
}

impl CustomerRecord {
    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn purchase_amount(&self) -> f64 {
        self.purchase_amount
    }

    pub fn review_rating(&self) -> f64 {
        self.review_rating
    }

    pub fn previous_purchases(&self) -> u32 {
        self.previous_purchases
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn gender(&self) -> Option<&str> {
        self.gender.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn item_purchased(&self) -> Option<&str> {
        self.item_purchased.as_deref()
    }

    pub fn preferred_payment_method(&self) -> Option<&str> {
        self.preferred_payment_method.as_deref()
    }

    /// Cell text for `column`, or `None` when the record has no value for it.
    /// The cluster column is owned by the label, not the record.
    pub(crate) fn cell(&self, column: Column) -> Option<String> {
        match column {
            Column::Age => Some(self.age.to_string()),
            Column::Gender => self.gender.clone(),
            Column::ItemPurchased => self.item_purchased.clone(),
            Column::Category => Some(self.category.to_string()),
            Column::PurchaseAmount => Some(self.purchase_amount.to_string()),
            Column::Location => self.location.clone(),
            Column::Color => Some(self.color.to_string()),
            Column::Season => Some(self.season.to_string()),
            Column::ReviewRating => Some(self.review_rating.to_string()),
            Column::PreviousPurchases => Some(self.previous_purchases.to_string()),
            Column::PreferredPaymentMethod => self.preferred_payment_method.clone(),
            Column::Frequency => Some(self.frequency.to_string()),
            Column::Cluster => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_spellings_are_exact() {
        assert_eq!(Category::parse("Clothing"), Some(Category::Clothing));
        assert_eq!(Category::parse("clothing"), None);
        assert_eq!(Category::parse("Shoes"), None);
        assert_eq!(Color::ALL.len(), 25);
    }

    #[test]
    fn test_aliases_map_to_canonical_spelling() {
        assert_eq!(Season::parse("Autumn"), Some(Season::Fall));
        assert_eq!(Season::Fall.as_str(), "Fall");
        assert_eq!(Frequency::parse("Yearly"), Some(Frequency::Annually));
        assert_eq!(Frequency::parse("Every 3 Months"), Some(Frequency::EveryThreeMonths));
    }

    #[test]
    fn test_from_str_names_field_on_error() {
        let err = "Shoes".parse::<Category>().unwrap_err();
        assert_eq!(err.field, "Category");
        assert!(err.reason.contains("Shoes"));
    }

    #[test]
    fn test_column_headers_round_trip() {
        for column in Column::SCHEMA {
            assert_eq!(Column::from_header(column.header()), Some(column));
        }
        assert_eq!(Column::from_header("Size"), None);
        assert_eq!(Column::PurchaseAmount.header(), "Purchase Amount (USD)");
    }

    #[test]
    fn test_canonicalize_only_applies_to_enum_columns() {
        assert_eq!(Column::Season.canonicalize("Autumn"), Some("Fall"));
        assert_eq!(Column::Gender.canonicalize("Male"), None);
    }

    #[test]
    fn test_season_serializes_canonical_name() {
        let json = serde_json::to_string(&Season::Fall).unwrap();
        assert_eq!(json, "\"Fall\"");
    }
}
