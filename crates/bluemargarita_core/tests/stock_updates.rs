use bluemargarita_core::db::open_db_in_memory;
use bluemargarita_core::{
    EntityErrorKind, Principal, Product, ProductDetails, ProductService, StockOperation,
    StockPolicy, StockService, StockUpdateRequest, SqliteProductRepository,
};
use rusqlite::Connection;
use rust_decimal::Decimal;

fn seed_product(conn: &Connection, code: &str, stock: i64) -> Product {
    let service = ProductService::new(SqliteProductRepository::try_new(conn).unwrap());
    service
        .create_product(
            &Principal::admin("root"),
            &ProductDetails {
                code: code.to_string(),
                description: format!("Item {code}"),
                wholesale_price: Decimal::new(500, 2),
                suggested_price: Decimal::new(1200, 2),
                low_stock_alert: 2,
            },
            stock,
        )
        .unwrap()
}

fn stock_service(conn: &Connection, policy: StockPolicy) -> StockService<SqliteProductRepository<'_>> {
    StockService::new(SqliteProductRepository::try_new(conn).unwrap(), policy)
}

fn request(product_id: i64, operation: StockOperation, amount: i64) -> StockUpdateRequest {
    StockUpdateRequest {
        product_id,
        operation,
        amount,
    }
}

fn stored_stock(conn: &Connection, product_id: i64) -> i64 {
    conn.query_row(
        "SELECT stock FROM products WHERE id = ?1;",
        [product_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn add_and_remove_report_signed_change() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-1", 4);
    let service = stock_service(&conn, StockPolicy::default());
    let clerk = Principal::user("clerk");

    let added = service
        .update_stock(&clerk, &request(product.id, StockOperation::Add, 6))
        .unwrap();
    assert_eq!(added.previous_stock, 4);
    assert_eq!(added.new_stock, 10);
    assert_eq!(added.change_amount, 6);
    assert_eq!(added.new_stock - added.previous_stock, added.change_amount);
    assert!(added.success);
    assert_eq!(added.operation_type, StockOperation::Add);
    assert_eq!(added.product_code, "RING-1");

    let removed = service
        .update_stock(&clerk, &request(product.id, StockOperation::Remove, 3))
        .unwrap();
    assert_eq!(removed.previous_stock, 10);
    assert_eq!(removed.new_stock, 7);
    assert_eq!(removed.change_amount, -3);
    assert_eq!(stored_stock(&conn, product.id), 7);
}

#[test]
fn set_reports_target_and_difference() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-2", 9);
    let service = stock_service(&conn, StockPolicy::default());

    let result = service
        .update_stock(
            &Principal::user("clerk"),
            &request(product.id, StockOperation::Set, 2),
        )
        .unwrap();
    assert_eq!(result.previous_stock, 9);
    assert_eq!(result.new_stock, 2);
    assert_eq!(result.change_amount, -7);
    assert_eq!(result.operation_type, StockOperation::Set);
}

#[test]
fn remove_beyond_available_stock_is_invalid_and_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-3", 4);
    let service = stock_service(&conn, StockPolicy::default());

    let err = service
        .update_stock(
            &Principal::user("clerk"),
            &request(product.id, StockOperation::Remove, 10),
        )
        .unwrap_err();
    let entity = err.entity().unwrap();
    assert_eq!(entity.kind, EntityErrorKind::InvalidArgument);
    assert_eq!(entity.code, "StockInvalidArgument");
    assert_eq!(stored_stock(&conn, product.id), 4);
}

#[test]
fn non_positive_amounts_and_negative_targets_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-4", 4);
    let service = stock_service(&conn, StockPolicy::default());
    let clerk = Principal::user("clerk");

    for (operation, amount) in [
        (StockOperation::Add, 0),
        (StockOperation::Add, -5),
        (StockOperation::Remove, 0),
        (StockOperation::Set, -1),
    ] {
        let err = service
            .update_stock(&clerk, &request(product.id, operation, amount))
            .unwrap_err();
        assert_eq!(err.code(), Some("StockInvalidArgument"), "{operation} {amount}");
    }
    assert_eq!(stored_stock(&conn, product.id), 4);
}

#[test]
fn add_overflow_is_invalid_argument() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-5", i64::MAX - 1);
    let service = stock_service(&conn, StockPolicy::default());

    let err = service
        .update_stock(
            &Principal::user("clerk"),
            &request(product.id, StockOperation::Add, 2),
        )
        .unwrap_err();
    assert_eq!(err.code(), Some("StockInvalidArgument"));
}

#[test]
fn set_far_below_zero_overflows_under_lenient_policy() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-9", 5);
    let service = stock_service(
        &conn,
        StockPolicy {
            allow_negative: true,
        },
    );
    let clerk = Principal::user("clerk");

    let err = service
        .update_stock(&clerk, &request(product.id, StockOperation::Set, i64::MIN))
        .unwrap_err();
    assert_eq!(err.code(), Some("StockInvalidArgument"));
    assert_eq!(stored_stock(&conn, product.id), 5);

    let lowered = service
        .update_stock(&clerk, &request(product.id, StockOperation::Set, -1_000))
        .unwrap();
    assert_eq!(lowered.change_amount, -1_005);
    assert_eq!(lowered.new_stock - lowered.previous_stock, lowered.change_amount);
}

#[test]
fn negative_stock_policy_allows_overselling() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-6", 4);
    let service = stock_service(
        &conn,
        StockPolicy {
            allow_negative: true,
        },
    );
    let clerk = Principal::user("clerk");

    let removed = service
        .update_stock(&clerk, &request(product.id, StockOperation::Remove, 10))
        .unwrap();
    assert_eq!(removed.new_stock, -6);
    assert_eq!(removed.change_amount, -10);

    let set = service
        .update_stock(&clerk, &request(product.id, StockOperation::Set, -2))
        .unwrap();
    assert_eq!(set.new_stock, -2);
}

#[test]
fn deleted_products_cannot_change_stock() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-7", 4);
    ProductService::new(SqliteProductRepository::try_new(&conn).unwrap())
        .delete_product(&Principal::admin("root"), product.id)
        .unwrap();
    let service = stock_service(&conn, StockPolicy::default());

    let err = service
        .update_stock(
            &Principal::admin("root"),
            &request(product.id, StockOperation::Add, 1),
        )
        .unwrap_err();
    assert_eq!(err.code(), Some("StockInvalidArgument"));
}

#[test]
fn unknown_product_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = stock_service(&conn, StockPolicy::default());

    let err = service
        .update_stock(
            &Principal::user("clerk"),
            &request(404, StockOperation::Set, 1),
        )
        .unwrap_err();
    assert_eq!(err.code(), Some("StockNotFound"));
}

#[test]
fn stock_update_records_actor_on_product() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-8", 1);
    let service = stock_service(&conn, StockPolicy::default());

    service
        .update_stock_by_name(&Principal::user("nikos"), product.id, "add", 5)
        .unwrap();
    let reloaded = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap())
        .get_product(product.id)
        .unwrap();
    assert_eq!(reloaded.stock, 6);
    assert_eq!(reloaded.last_updated_by, "nikos");
}

#[test]
fn concurrent_connections_do_not_lose_updates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.sqlite3");
    let conn = bluemargarita_core::open_db(&path).unwrap();
    let product = seed_product(&conn, "RING-9", 0);
    drop(conn);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || {
                let conn = bluemargarita_core::open_db(&path).unwrap();
                let service = stock_service(&conn, StockPolicy::default());
                for _ in 0..25 {
                    service
                        .update_stock(
                            &Principal::user("clerk"),
                            &request(product.id, StockOperation::Add, 1),
                        )
                        .unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let conn = bluemargarita_core::open_db(&path).unwrap();
    assert_eq!(stored_stock(&conn, product.id), 100);
}

#[test]
fn result_json_uses_wire_names() {
    let conn = open_db_in_memory().unwrap();
    let product = seed_product(&conn, "RING-10", 3);
    let result = stock_service(&conn, StockPolicy::default())
        .update_stock(
            &Principal::user("clerk"),
            &request(product.id, StockOperation::Remove, 1),
        )
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["productId"], product.id);
    assert_eq!(json["productCode"], "RING-10");
    assert_eq!(json["previousStock"], 3);
    assert_eq!(json["newStock"], 2);
    assert_eq!(json["changeAmount"], -1);
    assert_eq!(json["success"], true);
    assert_eq!(json["operationType"], "REMOVE");
    assert!(json["updatedAt"].is_string());
}
