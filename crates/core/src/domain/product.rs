use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::category::CategoryId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteelType {
    Stainless,
    Carbon,
    Galvanized,
    Structural,
}

impl SteelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stainless => "stainless",
            Self::Carbon => "carbon",
            Self::Galvanized => "galvanized",
            Self::Structural => "structural",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stainless" => Some(Self::Stainless),
            "carbon" => Some(Self::Carbon),
            "galvanized" => Some(Self::Galvanized),
            "structural" => Some(Self::Structural),
            _ => None,
        }
    }
}

/// A steel product in the catalog.
///
/// Dimensional fields are optional because not every product is sold by
/// length (fittings, fasteners). Prices are fixed-point with 2 fractional
/// digits; `unit_price` is the one quotations snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category_id: CategoryId,
    pub steel_type: SteelType,
    pub thickness_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub length_mm: Option<Decimal>,
    pub weight_per_meter: Option<Decimal>,
    pub unit_price: Decimal,
    pub price_per_meter: Option<Decimal>,
    pub price_per_kg: Option<Decimal>,
    pub stock: u32,
    pub minimum_stock: u32,
    pub unit_of_measure: String,
    pub image: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn low_stock(&self) -> bool {
        self.stock <= self.minimum_stock
    }
}
