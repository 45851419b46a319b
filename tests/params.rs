use storefront_api::{routes::params::Pagination, services::order_service::build_order_number};

#[test]
fn pagination_defaults() {
    let (page, limit, offset) = Pagination {
        page: None,
        limit: None,
    }
    .normalize();
    assert_eq!((page, limit, offset), (1, 20, 0));
}

#[test]
fn pagination_clamps_limit_to_maximum() {
    let (_, limit, _) = Pagination {
        page: None,
        limit: Some(1000),
    }
    .normalize();
    assert_eq!(limit, 100);

    let (_, limit, _) = Pagination {
        page: None,
        limit: Some(0),
    }
    .normalize();
    assert_eq!(limit, 1);
}

#[test]
fn pagination_floors_page_and_computes_offset() {
    let (page, limit, offset) = Pagination {
        page: Some(-3),
        limit: Some(10),
    }
    .normalize();
    assert_eq!((page, limit, offset), (1, 10, 0));

    let (page, limit, offset) = Pagination {
        page: Some(3),
        limit: Some(25),
    }
    .normalize();
    assert_eq!((page, limit, offset), (3, 25, 50));
}

#[test]
fn order_number_shape() {
    let number = build_order_number();
    let parts: Vec<&str> = number.split('-').collect();
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0], "ORD");
    assert_eq!(parts[1].len(), 14);
    assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
    assert_eq!(parts[2].len(), 6);
    assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
}
