mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use uuid::Uuid;
use voltstock::errors::ServiceError;
use voltstock::models::{
    SaleDraft, SaleLineInput, SalePatch, SaleStatus, ScrapTradeInInput,
};

use common::{current_stock, regular_line, seed_product, setup};

fn draft(items: Vec<SaleLineInput>, status: SaleStatus) -> SaleDraft {
    SaleDraft {
        invoice_number: None,
        customer_id: None,
        status,
        items,
        amount_paid: dec!(0),
        sale_date: None,
    }
}

#[tokio::test]
async fn completed_sale_edit_and_delete_restore_stock() {
    // 100 -> sell 10 -> 90, edit to 4 -> 96, delete -> 100.
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 100).await;

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 10, dec!(11000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 90);

    app.services
        .sales
        .update_sale(
            sale.id,
            SalePatch {
                items: Some(vec![regular_line(product_id, 4, dec!(11000))]),
                ..SalePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 96);

    app.services.sales.delete_sale(sale.id).await.unwrap();
    assert_eq!(current_stock(&app, product_id).await, 100);
}

#[tokio::test]
async fn edit_applies_quantity_delta_not_full_quantity() {
    // Editing q1 -> q2 nets exactly q1 - q2 against stock.
    let app = setup();
    let product_id = seed_product(&app, "Exide NS-40", 50).await;

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 8, dec!(9000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 42);

    // Raising the quantity applies only the increase.
    app.services
        .sales
        .update_sale(
            sale.id,
            SalePatch {
                items: Some(vec![regular_line(product_id, 12, dec!(9000))]),
                ..SalePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 38);
}

#[tokio::test]
async fn edit_swapping_products_returns_old_and_applies_new() {
    let app = setup();
    let old_product = seed_product(&app, "AGS GR-50", 20).await;
    let new_product = seed_product(&app, "Osaka P-100", 20).await;

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![regular_line(old_product, 5, dec!(11000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    assert_eq!(current_stock(&app, old_product).await, 15);

    app.services
        .sales
        .update_sale(
            sale.id,
            SalePatch {
                items: Some(vec![regular_line(new_product, 3, dec!(9500))]),
                ..SalePatch::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(current_stock(&app, old_product).await, 20);
    assert_eq!(current_stock(&app, new_product).await, 17);
}

#[tokio::test]
async fn returned_sale_has_no_stock_effect() {
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 30).await;

    app.services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 10, dec!(11000))],
            SaleStatus::Returned,
        ))
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 30);
}

#[tokio::test]
async fn marking_completed_sale_returned_reverses_stock() {
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 30).await;

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 10, dec!(11000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 20);

    app.services
        .sales
        .update_sale(
            sale.id,
            SalePatch {
                status: Some(SaleStatus::Returned),
                ..SalePatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 30);
}

#[tokio::test]
async fn missing_product_is_skipped_without_aborting_the_sale() {
    let app = setup();
    let known = seed_product(&app, "AGS GR-50", 10).await;
    let unknown = Uuid::new_v4();

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![
                regular_line(known, 2, dec!(11000)),
                regular_line(unknown, 5, dec!(8000)),
            ],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();

    // The known item applied; the dangling one was skipped, not fatal.
    assert_eq!(current_stock(&app, known).await, 8);
    assert!(app
        .services
        .sales
        .get_sale(sale.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn oversell_clamps_stock_at_zero() {
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 3).await;

    app.services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 10, dec!(11000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    assert_eq!(current_stock(&app, product_id).await, 0);
}

#[tokio::test]
async fn scrap_deduction_flows_into_discount_and_net() {
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 10).await;
    app.services
        .old_battery
        .record_collection("Exide-12V", dec!(50), dec!(180), 5)
        .await
        .unwrap();

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![SaleLineInput::ScrapTradeIn {
                product_id,
                quantity: 1,
                sale_price: dec!(11000),
                discount: dec!(0),
                scrap: ScrapTradeInInput {
                    name: "Exide-12V".to_string(),
                    weight: dec!(10),
                    rate_per_kg: dec!(180),
                    deduction_amount: dec!(1800),
                },
            }],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();

    assert_eq!(sale.total_amount, dec!(11000));
    assert_eq!(sale.discount, dec!(1800));
    assert_eq!(sale.net_amount, dec!(9200));
    assert_eq!(sale.remaining_balance, dec!(9200));

    // The consumption fact is linked and the aggregate decremented.
    let scrap = sale.items[0].scrap_trade_in.as_ref().unwrap();
    assert!(scrap.consumption_id.is_some());
    assert_eq!(
        app.services
            .old_battery
            .available_quantity("Exide-12V")
            .await
            .unwrap(),
        4
    );
}

#[tokio::test]
async fn deleting_scrap_sale_restores_old_battery_stock() {
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 10).await;
    app.services
        .old_battery
        .record_collection("Exide-12V", dec!(50), dec!(180), 5)
        .await
        .unwrap();

    let sale = app
        .services
        .sales
        .create_sale(draft(
            vec![SaleLineInput::ScrapTradeIn {
                product_id,
                quantity: 2,
                sale_price: dec!(11000),
                discount: dec!(0),
                scrap: ScrapTradeInInput {
                    name: "Exide-12V".to_string(),
                    weight: dec!(20),
                    rate_per_kg: dec!(180),
                    deduction_amount: dec!(3600),
                },
            }],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    assert_eq!(
        app.services
            .old_battery
            .available_quantity("Exide-12V")
            .await
            .unwrap(),
        3
    );

    app.services.sales.delete_sale(sale.id).await.unwrap();
    assert_eq!(
        app.services
            .old_battery
            .available_quantity("Exide-12V")
            .await
            .unwrap(),
        5
    );
    assert_eq!(current_stock(&app, product_id).await, 10);
}

#[tokio::test]
async fn sequenced_invoice_numbers_are_assigned_per_series() {
    let app = setup();
    let product_id = seed_product(&app, "AGS GR-50", 100).await;

    let first = app
        .services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 1, dec!(11000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();
    let second = app
        .services
        .sales
        .create_sale(draft(
            vec![regular_line(product_id, 1, dec!(11000))],
            SaleStatus::Completed,
        ))
        .await
        .unwrap();

    assert_eq!(first.invoice_number, "INV-0001");
    assert_eq!(second.invoice_number, "INV-0002");
}

#[tokio::test]
async fn create_rejects_empty_items() {
    let app = setup();
    let err = app
        .services
        .sales
        .create_sale(draft(vec![], SaleStatus::Completed))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn update_of_missing_sale_is_not_found() {
    let app = setup();
    let err = app
        .services
        .sales
        .update_sale(Uuid::new_v4(), SalePatch::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
