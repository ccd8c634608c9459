//! Sale records and the categorical dimensions used to slice them.
//!
//! Records are owned by the sales store; the engine only reads them.
//! All money fields use `rust_decimal::Decimal`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Decimal places of the currency all prices are expressed in.
pub const CURRENCY_SCALE: u32 = 2;

/// Key under which records lacking a dimension value are aggregated.
pub const UNKNOWN_KEY: &str = "(unknown)";

/// Kind of buyer behind a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    Retail,
    Wholesale,
    Institutional,
}

impl CustomerType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Wholesale => "wholesale",
            Self::Institutional => "institutional",
        }
    }
}

impl FromStr for CustomerType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retail" | "pharmacy" => Ok(Self::Retail),
            "wholesale" | "distributor" => Ok(Self::Wholesale),
            "institutional" | "hospital" | "clinic" | "government" => Ok(Self::Institutional),
            other => Err(AnalyticsError::InvalidRange(format!(
                "unrecognized customer type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single pharmaceutical sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub id: i64,
    pub product_name: String,
    pub product_category: String,
    pub product_code: String,
    /// Units sold; zero only appears in uncleaned input.
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Fraction in `[0, 1]` taken off the gross amount.
    pub discount: Decimal,
    /// Net amount: `quantity * unit_price * (1 - discount)` at currency precision.
    pub total_price: Decimal,
    pub pharmacy_name: Option<String>,
    pub pharmacy_location: Option<String>,
    pub customer_type: Option<CustomerType>,
    /// `None` when the source timestamp was missing or malformed.
    pub sold_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub sales_rep: Option<String>,
    pub campaign_id: Option<String>,
    pub notes: Option<String>,
    /// Soft-delete marker.
    pub is_active: bool,
}

impl SaleRecord {
    /// Creates an active record with the net total derived from its inputs.
    ///
    /// Optional attributes start empty; see the `with_*` helpers.
    #[must_use]
    pub fn new(
        id: i64,
        product_name: impl Into<String>,
        product_category: impl Into<String>,
        quantity: u32,
        unit_price: Decimal,
        discount: Decimal,
        sold_at: Option<DateTime<Utc>>,
    ) -> Self {
        let product_name = product_name.into();
        Self {
            id,
            product_code: format!("SKU-{id:06}"),
            product_name,
            product_category: product_category.into(),
            quantity,
            unit_price,
            discount,
            total_price: Self::compute_total(quantity, unit_price, discount),
            pharmacy_name: None,
            pharmacy_location: None,
            customer_type: None,
            sold_at,
            payment_method: None,
            sales_rep: None,
            campaign_id: None,
            notes: None,
            is_active: true,
        }
    }

    /// Computes `quantity * unit_price * (1 - discount)` rounded half away
    /// from zero to currency precision.
    #[must_use]
    pub fn compute_total(quantity: u32, unit_price: Decimal, discount: Decimal) -> Decimal {
        (Decimal::from(quantity) * unit_price * (Decimal::ONE - discount))
            .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.product_code = code.into();
        self
    }

    #[must_use]
    pub fn with_pharmacy(mut self, name: impl Into<String>, location: impl Into<String>) -> Self {
        self.pharmacy_name = Some(name.into());
        self.pharmacy_location = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_rep(mut self, rep: impl Into<String>) -> Self {
        self.sales_rep = Some(rep.into());
        self
    }

    #[must_use]
    pub fn with_customer_type(mut self, customer_type: CustomerType) -> Self {
        self.customer_type = Some(customer_type);
        self
    }

    /// Marks the record as soft-deleted.
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Amount before discount: `quantity * unit_price`.
    #[must_use]
    pub fn gross_amount(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }

    /// Money taken off by the discount.
    #[must_use]
    pub fn discount_amount(&self) -> Decimal {
        self.gross_amount() - self.total_price
    }
}

/// Categorical attribute used to slice aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Product,
    Pharmacy,
    Location,
    Representative,
    CustomerType,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Category,
        Dimension::Product,
        Dimension::Pharmacy,
        Dimension::Location,
        Dimension::Representative,
        Dimension::CustomerType,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Product => "product",
            Self::Pharmacy => "pharmacy",
            Self::Location => "location",
            Self::Representative => "representative",
            Self::CustomerType => "customer_type",
        }
    }

    /// Returns the record's value for this dimension, or `None` when absent
    /// or blank.
    #[must_use]
    pub fn value_of<'a>(&self, record: &'a SaleRecord) -> Option<&'a str> {
        let value = match self {
            Self::Category => Some(record.product_category.as_str()),
            Self::Product => Some(record.product_name.as_str()),
            Self::Pharmacy => record.pharmacy_name.as_deref(),
            Self::Location => record.pharmacy_location.as_deref(),
            Self::Representative => record.sales_rep.as_deref(),
            Self::CustomerType => record.customer_type.as_ref().map(CustomerType::as_str),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Same as [`Self::value_of`] with missing values mapped to [`UNKNOWN_KEY`].
    #[must_use]
    pub fn key_of<'a>(&self, record: &'a SaleRecord) -> &'a str {
        self.value_of(record).unwrap_or(UNKNOWN_KEY)
    }
}

impl FromStr for Dimension {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "category" | "product_category" => Ok(Self::Category),
            "product" | "product_name" => Ok(Self::Product),
            "pharmacy" | "pharmacy_name" => Ok(Self::Pharmacy),
            "location" | "pharmacy_location" => Ok(Self::Location),
            "representative" | "rep" | "sales_rep" => Ok(Self::Representative),
            "customer_type" | "customer" => Ok(Self::CustomerType),
            other => {
                let known: Vec<&str> = Self::ALL.iter().map(Dimension::as_str).collect();
                Err(AnalyticsError::InvalidRange(format!(
                    "unrecognized dimension '{other}', expected one of {}",
                    known.join(", ")
                )))
            }
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_applies_discount_and_rounds_to_cents() {
        assert_eq!(SaleRecord::compute_total(3, dec!(10.00), dec!(0)), dec!(30.00));
        assert_eq!(SaleRecord::compute_total(2, dec!(12.50), dec!(0.10)), dec!(22.50));
        // 1 * 0.125 = 0.125 -> rounds away from zero
        assert_eq!(SaleRecord::compute_total(1, dec!(0.125), dec!(0)), dec!(0.13));
        assert_eq!(SaleRecord::compute_total(5, dec!(9.99), dec!(1)), dec!(0.00));
    }

    #[test]
    fn gross_and_discount_amounts() {
        let record = SaleRecord::new(1, "Dipirona", "Analgesics", 4, dec!(5.00), dec!(0.25), None);
        assert_eq!(record.gross_amount(), dec!(20.00));
        assert_eq!(record.total_price, dec!(15.00));
        assert_eq!(record.discount_amount(), dec!(5.00));
        assert!(record.is_active);
        assert!(!record.clone().inactive().is_active);
    }

    #[test]
    fn dimension_values_fall_back_to_unknown() {
        let record = SaleRecord::new(1, "Amoxil", "Antibiotics", 1, dec!(1), dec!(0), None)
            .with_rep("  ");
        assert_eq!(Dimension::Category.key_of(&record), "Antibiotics");
        assert_eq!(Dimension::Product.key_of(&record), "Amoxil");
        assert_eq!(Dimension::Pharmacy.key_of(&record), UNKNOWN_KEY);
        assert_eq!(Dimension::Representative.value_of(&record), None);

        let record = record
            .with_pharmacy("Drogasil", "Campinas")
            .with_customer_type(CustomerType::Wholesale);
        assert_eq!(Dimension::Pharmacy.key_of(&record), "Drogasil");
        assert_eq!(Dimension::Location.key_of(&record), "Campinas");
        assert_eq!(Dimension::CustomerType.key_of(&record), "wholesale");
    }

    #[test]
    fn parses_dimensions_and_customer_types() {
        assert_eq!("Category".parse::<Dimension>().unwrap(), Dimension::Category);
        assert_eq!("sales-rep".parse::<Dimension>().unwrap(), Dimension::Representative);
        assert_eq!("customer_type".parse::<Dimension>().unwrap(), Dimension::CustomerType);
        let err = "brand".parse::<Dimension>().unwrap_err();
        assert!(err.to_string().contains("category, product, pharmacy"));
        for dimension in Dimension::ALL {
            assert_eq!(dimension.as_str().parse::<Dimension>().unwrap(), dimension);
        }

        assert_eq!("Hospital".parse::<CustomerType>().unwrap(), CustomerType::Institutional);
        assert_eq!("retail".parse::<CustomerType>().unwrap(), CustomerType::Retail);
        assert!("vip".parse::<CustomerType>().is_err());
    }
}
