//! Deterministic demo catalog used by the CLI `seed` command and by
//! integration tests. Re-running the seed is idempotent: every row keys
//! on a fixed UUID and repositories upsert on id.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use pozinox_core::domain::category::{Category, CategoryId};
use pozinox_core::domain::customer::{Customer, CustomerId, CustomerKind};
use pozinox_core::domain::product::{Product, ProductId, SteelType};
use pozinox_core::domain::supplier::{Supplier, SupplierId};

use crate::connection::DbPool;
use crate::repositories::{
    CategoryRepository, CustomerRepository, ProductRepository, RepositoryError,
    SqlCategoryRepository, SqlCustomerRepository, SqlProductRepository, SqlSupplierRepository,
    SupplierRepository,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub products: usize,
    pub suppliers: usize,
    pub customers: usize,
}

fn seed_uuid(tag: u128) -> Uuid {
    Uuid::from_u128(tag)
}

fn price(units: i64, cents: u32) -> Decimal {
    Decimal::new(units * 100 + i64::from(cents), 2)
}

pub async fn seed_demo_catalog(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let registered_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().ok_or_else(|| {
        RepositoryError::Decode("seed timestamp is out of range".to_string())
    })?;

    let categories = vec![
        Category {
            id: CategoryId(seed_uuid(0x101)),
            name: "Planchas".to_string(),
            description: "Planchas de acero en distintos espesores".to_string(),
            active: true,
        },
        Category {
            id: CategoryId(seed_uuid(0x102)),
            name: "Perfiles".to_string(),
            description: "Perfiles estructurales y tubulares".to_string(),
            active: true,
        },
        Category {
            id: CategoryId(seed_uuid(0x103)),
            name: "Barras".to_string(),
            description: "Barras redondas y cuadradas".to_string(),
            active: true,
        },
    ];

    let products = vec![
        Product {
            id: ProductId(seed_uuid(0x201)),
            sku: "PL-INOX-304-1.5".to_string(),
            name: "Plancha inoxidable 304 1.5mm".to_string(),
            description: "Plancha de acero inoxidable AISI 304, terminacion 2B".to_string(),
            category_id: CategoryId(seed_uuid(0x101)),
            steel_type: SteelType::Stainless,
            thickness_mm: Some(Decimal::new(15, 1)),
            width_mm: Some(Decimal::from(1000)),
            length_mm: Some(Decimal::from(2000)),
            weight_per_meter: None,
            unit_price: price(45_990, 0),
            price_per_meter: None,
            price_per_kg: Some(price(2_890, 0)),
            stock: 34,
            minimum_stock: 10,
            unit_of_measure: "unidad".to_string(),
            image: None,
            active: true,
            created_at: registered_at,
            updated_at: registered_at,
        },
        Product {
            id: ProductId(seed_uuid(0x202)),
            sku: "PF-CUAD-40X40".to_string(),
            name: "Perfil cuadrado 40x40x2mm".to_string(),
            description: "Perfil tubular cuadrado de acero carbono, largo 6m".to_string(),
            category_id: CategoryId(seed_uuid(0x102)),
            steel_type: SteelType::Carbon,
            thickness_mm: Some(Decimal::from(2)),
            width_mm: Some(Decimal::from(40)),
            length_mm: Some(Decimal::from(6000)),
            weight_per_meter: Some(Decimal::new(236, 2)),
            unit_price: price(12_490, 0),
            price_per_meter: Some(price(2_082, 0)),
            price_per_kg: None,
            stock: 120,
            minimum_stock: 30,
            unit_of_measure: "tira".to_string(),
            image: None,
            active: true,
            created_at: registered_at,
            updated_at: registered_at,
        },
        Product {
            id: ProductId(seed_uuid(0x203)),
            sku: "BA-RED-12".to_string(),
            name: "Barra redonda 12mm".to_string(),
            description: "Barra redonda galvanizada, largo 6m".to_string(),
            category_id: CategoryId(seed_uuid(0x103)),
            steel_type: SteelType::Galvanized,
            thickness_mm: None,
            width_mm: Some(Decimal::from(12)),
            length_mm: Some(Decimal::from(6000)),
            weight_per_meter: Some(Decimal::new(89, 2)),
            unit_price: price(5_990, 0),
            price_per_meter: Some(price(998, 0)),
            price_per_kg: None,
            stock: 4,
            minimum_stock: 20,
            unit_of_measure: "tira".to_string(),
            image: None,
            active: true,
            created_at: registered_at,
            updated_at: registered_at,
        },
    ];

    let suppliers = vec![Supplier {
        id: SupplierId(seed_uuid(0x301)),
        name: "Aceros Andinos".to_string(),
        company_name: "Aceros Andinos SpA".to_string(),
        tax_id: "76.543.210-K".to_string(),
        email: "ventas@acerosandinos.cl".to_string(),
        phone: "+56 2 2345 6789".to_string(),
        address: "Camino a Melipilla 9000".to_string(),
        commune: "Maipu".to_string(),
        city: "Santiago".to_string(),
        contact_name: "Jorge Fuentes".to_string(),
        lead_time_days: 7,
        payment_terms: "30 dias".to_string(),
        active: true,
        registered_at,
        notes: String::new(),
    }];

    let customers = vec![Customer {
        id: CustomerId(seed_uuid(0x401)),
        kind: CustomerKind::Company,
        first_name: "Carolina".to_string(),
        last_name: "Mendez".to_string(),
        company_name: "Constructora del Pacifico Ltda".to_string(),
        tax_id: "77.111.222-3".to_string(),
        email: "adquisiciones@cpacifico.cl".to_string(),
        phone: "+56 9 8765 4321".to_string(),
        alternate_phone: String::new(),
        address: "Av. Apoquindo 4500".to_string(),
        commune: "Las Condes".to_string(),
        city: "Santiago".to_string(),
        postal_code: "7550000".to_string(),
        active: true,
        registered_at,
    }];

    let category_repo = SqlCategoryRepository::new(pool.clone());
    for category in &categories {
        category_repo.save(category.clone()).await?;
    }

    let product_repo = SqlProductRepository::new(pool.clone());
    for product in &products {
        product_repo.save(product.clone()).await?;
    }

    let supplier_repo = SqlSupplierRepository::new(pool.clone());
    for supplier in &suppliers {
        supplier_repo.save(supplier.clone()).await?;
    }

    let customer_repo = SqlCustomerRepository::new(pool.clone());
    for customer in &customers {
        customer_repo.save(customer.clone()).await?;
    }

    Ok(SeedSummary {
        categories: categories.len(),
        products: products.len(),
        suppliers: suppliers.len(),
        customers: customers.len(),
    })
}
