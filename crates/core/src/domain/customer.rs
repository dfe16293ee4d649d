use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub Uuid);

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerKind {
    Individual,
    Company,
    Contractor,
    Distributor,
}

impl CustomerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Company => "company",
            Self::Contractor => "contractor",
            Self::Distributor => "distributor",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "individual" => Some(Self::Individual),
            "company" => Some(Self::Company),
            "contractor" => Some(Self::Contractor),
            "distributor" => Some(Self::Distributor),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub kind: CustomerKind,
    pub first_name: String,
    pub last_name: String,
    /// Legal name, only meaningful for companies.
    pub company_name: String,
    pub tax_id: String,
    pub email: String,
    pub phone: String,
    pub alternate_phone: String,
    pub address: String,
    pub commune: String,
    pub city: String,
    pub postal_code: String,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Customer {
    /// Companies display their legal name when one is on record; everyone
    /// else displays "first last".
    pub fn display_name(&self) -> String {
        if self.kind == CustomerKind::Company && !self.company_name.is_empty() {
            return self.company_name.clone();
        }
        format!("{} {}", self.first_name, self.last_name)
    }
}
