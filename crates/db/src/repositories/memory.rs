use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use pozinox_core::domain::product::{Product, ProductId, SteelType};
use pozinox_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use pozinox_core::numbering::{next_number, DocumentKind};

use super::{ProductFilter, ProductRepository, QuotationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<HashMap<Uuid, Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.get(&id.0).cloned())
    }

    async fn find_by_sku(&self, sku: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.values().find(|product| product.sku == sku).cloned())
    }

    async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let matches_search = |product: &Product, needle: &str| {
            let needle = needle.to_ascii_lowercase();
            product.name.to_ascii_lowercase().contains(&needle)
                || product.sku.to_ascii_lowercase().contains(&needle)
                || product.description.to_ascii_lowercase().contains(&needle)
        };

        let mut selected: Vec<Product> = products
            .values()
            .filter(|product| filter.include_inactive || product.active)
            .filter(|product| {
                filter.category_id.as_ref().map_or(true, |id| &product.category_id == id)
            })
            .filter(|product| {
                filter.steel_type.map_or(true, |steel: SteelType| product.steel_type == steel)
            })
            .filter(|product| {
                filter.search.as_deref().map_or(true, |needle| matches_search(product, needle))
            })
            .cloned()
            .collect();

        selected.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(selected)
    }

    async fn list_low_stock(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut selected: Vec<Product> =
            products.values().filter(|product| product.active && product.low_stock()).cloned().collect();
        selected.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
        Ok(selected)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        products.insert(product.id.0, product);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    quotations: RwLock<HashMap<Uuid, Quotation>>,
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.get(&id.0).cloned())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.values().find(|quotation| quotation.number == number).cloned())
    }

    async fn find_draft_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Option<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations
            .values()
            .filter(|quotation| {
                quotation.owner_id == owner_id && quotation.status == QuotationStatus::Draft
            })
            .max_by_key(|quotation| quotation.created_at)
            .cloned())
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        let mut selected: Vec<Quotation> = quotations
            .values()
            .filter(|quotation| quotation.owner_id == owner_id)
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(selected)
    }

    async fn create(&self, mut quotation: Quotation) -> Result<Quotation, RepositoryError> {
        let mut quotations = self.quotations.write().await;
        let date = quotation.created_at.date_naive();
        let created_so_far = quotations
            .values()
            .filter(|existing| existing.created_at.date_naive() == date)
            .count() as u32;

        quotation.number = next_number(DocumentKind::Quotation, date, created_so_far);
        quotations.insert(quotation.id.0, quotation.clone());
        Ok(quotation)
    }

    async fn save(&self, quotation: &Quotation) -> Result<(), RepositoryError> {
        let mut quotations = self.quotations.write().await;
        quotations.insert(quotation.id.0, quotation.clone());
        Ok(())
    }
}
