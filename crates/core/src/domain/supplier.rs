use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupplierId(pub Uuid);

impl std::fmt::Display for SupplierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    pub company_name: String,
    pub tax_id: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub commune: String,
    pub city: String,
    pub contact_name: String,
    pub lead_time_days: u32,
    pub payment_terms: String,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
    pub notes: String,
}
