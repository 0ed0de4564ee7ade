use bluemargarita_core::db::open_db_in_memory;
use bluemargarita_core::{
    ListQuery, LowStockFilter, MispricedFilter, Predicate, Principal, Product, ProductDetails,
    ProductField, ProductService, SortDirection, SqliteProductRepository,
};
use rust_decimal::Decimal;

fn details(code: &str, description: &str, low_stock_alert: i64) -> ProductDetails {
    ProductDetails {
        code: code.to_string(),
        description: description.to_string(),
        wholesale_price: Decimal::new(750, 2),
        suggested_price: Decimal::new(1990, 2),
        low_stock_alert,
    }
}

fn create(
    service: &ProductService<SqliteProductRepository<'_>>,
    code: &str,
    description: &str,
    stock: i64,
    alert: i64,
) -> Product {
    service
        .create_product(
            &Principal::user("clerk"),
            &details(code, description, alert),
            stock,
        )
        .unwrap()
}

#[test]
fn create_normalizes_and_persists_prices() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());

    let product = create(&service, " NK-001 ", " Silver necklace ", 5, 1);
    assert_eq!(product.code, "NK-001");
    assert_eq!(product.description, "Silver necklace");

    let loaded = service.get_product(product.id).unwrap();
    assert_eq!(loaded.wholesale_price, Decimal::new(750, 2));
    assert_eq!(loaded.suggested_price, Decimal::new(1990, 2));
    assert_eq!(loaded.stock, 5);
    assert_eq!(loaded, product);
}

#[test]
fn codes_are_unique_case_insensitively() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());

    create(&service, "ER-10", "Earrings", 1, 0);
    let err = service
        .create_product(&Principal::user("clerk"), &details("er-10", "Copy", 0), 1)
        .unwrap_err();
    assert_eq!(err.code(), Some("ProductAlreadyExists"));
}

#[test]
fn invalid_prices_and_counts_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    let clerk = Principal::user("clerk");

    let mut negative_price = details("BAD-1", "Bad", 0);
    negative_price.wholesale_price = Decimal::new(-1, 0);
    let mut three_decimals = details("BAD-2", "Bad", 0);
    three_decimals.suggested_price = Decimal::new(1999, 3);
    let negative_alert = details("BAD-3", "Bad", -1);

    for input in [&negative_price, &three_decimals, &negative_alert] {
        let err = service.create_product(&clerk, input, 0).unwrap_err();
        assert_eq!(err.code(), Some("ProductInvalidArgument"), "{}", input.code);
    }
    let err = service
        .create_product(&clerk, &details("BAD-4", "Bad", 0), -3)
        .unwrap_err();
    assert_eq!(err.code(), Some("ProductInvalidArgument"));
}

#[test]
fn prices_are_capped_at_ten_significant_digits() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    let clerk = Principal::user("clerk");

    let mut ceiling = details("CAP-1", "Most expensive", 0);
    ceiling.wholesale_price = Decimal::new(9_999_999_999, 2);
    ceiling.suggested_price = Decimal::new(9_999_999_999, 2);
    let created = service.create_product(&clerk, &ceiling, 1).unwrap();
    assert_eq!(created.suggested_price.to_string(), "99999999.99");

    let mut over = details("CAP-2", "Too expensive", 0);
    over.suggested_price = Decimal::new(10_000_000_000, 2);
    let err = service.create_product(&clerk, &over, 1).unwrap_err();
    assert_eq!(err.code(), Some("ProductInvalidArgument"));

    let mut huge = details("CAP-1", "Most expensive", 0);
    huge.wholesale_price = Decimal::MAX;
    let err = service.update_product(&clerk, created.id, &huge).unwrap_err();
    assert_eq!(err.code(), Some("ProductInvalidArgument"));
}

#[test]
fn update_changes_catalogue_fields_but_not_stock() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    let product = create(&service, "BR-1", "Bracelet", 8, 2);

    let mut changed = details("BR-1A", "Bracelet, gold plated", 3);
    changed.suggested_price = Decimal::new(2500, 2);
    let updated = service
        .update_product(&Principal::user("nikos"), product.id, &changed)
        .unwrap();

    assert_eq!(updated.code, "BR-1A");
    assert_eq!(updated.description, "Bracelet, gold plated");
    assert_eq!(updated.suggested_price, Decimal::new(2500, 2));
    assert_eq!(updated.low_stock_alert, 3);
    assert_eq!(updated.stock, 8);
    assert_eq!(updated.last_updated_by, "nikos");
    assert_eq!(updated.created_by, "clerk");
}

#[test]
fn update_cannot_steal_another_code() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    create(&service, "A-1", "First", 1, 0);
    let second = create(&service, "A-2", "Second", 1, 0);

    let err = service
        .update_product(&Principal::user("clerk"), second.id, &details("a-1", "Second", 0))
        .unwrap_err();
    assert_eq!(err.code(), Some("ProductAlreadyExists"));
}

#[test]
fn delete_is_admin_only_and_soft() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    let product = create(&service, "PIN-1", "Pin", 3, 1);

    let err = service
        .delete_product(&Principal::user("clerk"), product.id)
        .unwrap_err();
    assert_eq!(err.code(), Some("ProductNotAuthorized"));

    let deleted = service
        .delete_product(&Principal::admin("root"), product.id)
        .unwrap();
    assert!(!deleted.is_active);
    assert!(deleted.deleted_at.is_some());
    assert_eq!(service.get_product(product.id).unwrap(), deleted);

    let err = service
        .update_product(&Principal::user("clerk"), product.id, &details("PIN-1", "Pin", 1))
        .unwrap_err();
    assert_eq!(err.code(), Some("ProductInvalidArgument"));
}

#[test]
fn low_stock_report_lists_active_products_at_or_below_threshold() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    create(&service, "LS-1", "Anklet blue", 2, 2);
    create(&service, "LS-2", "Anklet red", 0, 1);
    create(&service, "LS-3", "Brooch", 10, 3);
    let gone = create(&service, "LS-4", "Anklet old", 0, 5);
    service
        .delete_product(&Principal::admin("root"), gone.id)
        .unwrap();

    let page = service
        .list_low_stock_products(&LowStockFilter::default(), 0, 20)
        .unwrap();
    let codes: Vec<_> = page.data.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["LS-2", "LS-1"]);
    assert!(page.data.iter().all(Product::is_low_stock));
}

#[test]
fn low_stock_report_applies_text_and_range_filters() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    create(&service, "AN-1", "Anklet blue", 2, 4);
    create(&service, "AN-2", "Anklet red", 4, 4);
    create(&service, "RG-1", "Ring", 1, 4);

    let by_text = service
        .list_low_stock_products(
            &LowStockFilter {
                name_or_code: Some("anklet".to_string()),
                ..LowStockFilter::default()
            },
            0,
            20,
        )
        .unwrap();
    assert_eq!(by_text.total_elements, 2);

    let by_code = service
        .list_low_stock_products(
            &LowStockFilter {
                name_or_code: Some("RG".to_string()),
                ..LowStockFilter::default()
            },
            0,
            20,
        )
        .unwrap();
    assert_eq!(by_code.data.len(), 1);
    assert_eq!(by_code.data[0].code, "RG-1");

    let by_range = service
        .list_low_stock_products(
            &LowStockFilter {
                name_or_code: None,
                min_stock: Some(2),
                max_stock: Some(3),
            },
            0,
            20,
        )
        .unwrap();
    let codes: Vec<_> = by_range.data.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["AN-1"]);

    let err = service
        .list_low_stock_products(
            &LowStockFilter {
                name_or_code: None,
                min_stock: Some(5),
                max_stock: Some(1),
            },
            0,
            20,
        )
        .unwrap_err();
    assert_eq!(err.code(), Some("ProductInvalidArgument"));
}

#[test]
fn mispriced_report_lists_active_products_at_or_below_cost() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    let clerk = Principal::user("clerk");
    let priced = |code: &str, wholesale: i64, suggested: i64| {
        let mut input = details(code, &format!("Charm {code}"), 0);
        input.wholesale_price = Decimal::new(wholesale, 2);
        input.suggested_price = Decimal::new(suggested, 2);
        service.create_product(&clerk, &input, 1).unwrap()
    };

    priced("MP-1", 900, 1000);
    priced("MP-2", 1000, 1000);
    priced("MP-3", 1000, 950);
    // numeric, not text, ordering: "9.00" > "10.00" as strings
    priced("MP-4", 1000, 900);
    let gone = priced("MP-5", 500, 100);
    service
        .delete_product(&Principal::admin("root"), gone.id)
        .unwrap();

    let page = service
        .list_mispriced_products(&MispricedFilter::default(), 0, 20)
        .unwrap();
    let codes: Vec<_> = page.data.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["MP-4", "MP-3", "MP-2"]);

    let narrowed = service
        .list_mispriced_products(
            &MispricedFilter {
                name_or_code: Some("mp-3".to_string()),
            },
            0,
            20,
        )
        .unwrap();
    assert_eq!(narrowed.total_elements, 1);
    assert_eq!(narrowed.data[0].code, "MP-3");
}

#[test]
fn list_products_sorts_and_paginates() {
    let conn = open_db_in_memory().unwrap();
    let service = ProductService::new(SqliteProductRepository::try_new(&conn).unwrap());
    for index in 0..5 {
        create(&service, &format!("PG-{index}"), "Paged item", index, 0);
    }

    let query = ListQuery::new()
        .filter(Predicate::contains(ProductField::Code, "PG-"))
        .sort(ProductField::Stock, SortDirection::Desc)
        .page(1, 2);
    let page = service.list_products(&query).unwrap();

    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 1);
    assert_eq!(page.page_size, 2);
    let stocks: Vec<_> = page.data.iter().map(|p| p.stock).collect();
    assert_eq!(stocks, vec![2, 1]);
}
