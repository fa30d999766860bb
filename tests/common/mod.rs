#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use voltstock::{
    config::AppConfig,
    models::{Customer, Product, SaleLineInput, Supplier},
    services::AppServices,
    store::{collections, InMemoryDocumentStore, TenantStore},
};

pub struct TestApp {
    pub services: AppServices,
    pub store: TenantStore,
    pub config: AppConfig,
}

pub fn setup() -> TestApp {
    let config = AppConfig::default();
    setup_with_config(config)
}

pub fn setup_with_config(config: AppConfig) -> TestApp {
    let backend = Arc::new(InMemoryDocumentStore::new());
    let services = AppServices::build(backend.clone(), &config, None);
    let store = TenantStore::new(backend, config.tenant_id.clone());
    TestApp {
        services,
        store,
        config,
    }
}

pub async fn seed_product(app: &TestApp, name: &str, current_stock: i32) -> Uuid {
    let product = Product {
        id: Uuid::new_v4(),
        name: name.to_string(),
        unit: "pcs".to_string(),
        trade_price: Decimal::new(9500, 0),
        sale_price: Decimal::new(11000, 0),
        current_stock,
        min_stock: 2,
        created_at: Utc::now(),
    };
    app.store
        .save(collections::PRODUCTS, &product.id.to_string(), &product)
        .await
        .expect("seed product");
    product.id
}

pub async fn seed_customer(app: &TestApp, name: &str) -> Uuid {
    let customer = Customer {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: None,
        created_at: Utc::now(),
    };
    app.store
        .save(collections::CUSTOMERS, &customer.id.to_string(), &customer)
        .await
        .expect("seed customer");
    customer.id
}

pub async fn seed_supplier(app: &TestApp, name: &str, balance: Decimal) -> Uuid {
    let supplier = Supplier {
        id: Uuid::new_v4(),
        name: name.to_string(),
        phone: None,
        balance,
        created_at: Utc::now(),
    };
    app.store
        .save(collections::SUPPLIERS, &supplier.id.to_string(), &supplier)
        .await
        .expect("seed supplier");
    supplier.id
}

pub async fn current_stock(app: &TestApp, product_id: Uuid) -> i32 {
    app.services
        .stock_ledger
        .current_stock(product_id)
        .await
        .expect("current stock")
}

pub async fn supplier_balance(app: &TestApp, supplier_id: Uuid) -> Decimal {
    let supplier: Supplier = app
        .store
        .load(collections::SUPPLIERS, &supplier_id.to_string())
        .await
        .expect("load supplier")
        .expect("supplier exists");
    supplier.balance
}

pub fn regular_line(product_id: Uuid, quantity: i32, sale_price: Decimal) -> SaleLineInput {
    SaleLineInput::Regular {
        product_id,
        quantity,
        sale_price,
        discount: Decimal::ZERO,
    }
}

pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}
