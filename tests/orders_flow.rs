mod common;

use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

use storefront_api::{
    dto::cart::AddCartItemRequest,
    dto::orders::CreateOrderRequest,
    entity::{orders, products},
    error::AppError,
    services::{cart_service, order_service},
};

use common::{auth_user, create_category, create_product, create_user, setup_state};

// Integration flow: add to cart twice (merging), order, then verify the
// order snapshot, the emptied cart and the decremented stock.
#[tokio::test]
async fn checkout_creates_order_and_clears_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "buyer@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Test Widget", 1000, Some(10), "active").await?;

    for _ in 0..2 {
        cart_service::add_item(
            &state,
            &user,
            AddCartItemRequest {
                product_id: product.id,
                quantity: 2,
            },
        )
        .await?;
    }

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1, "re-adding must merge, not duplicate");
    assert_eq!(cart.items[0].quantity, 4);
    assert_eq!(cart.subtotal, 4000);

    let resp = order_service::create_order(&state, &user, CreateOrderRequest::default()).await?;
    let created = resp.data.unwrap();
    assert!(created.order.order_number.starts_with("ORD-"));
    assert_eq!(created.order.subtotal, 4000);
    assert_eq!(created.order.total, 4000);
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].quantity, 4);
    assert_eq!(created.items[0].unit_price, 1000);
    assert_eq!(created.items[0].line_total, 4000);
    assert_eq!(created.items[0].product_name, "Test Widget");

    // Cart is emptied, not deleted.
    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, 0);

    // Stock went from 10 to 6.
    let live = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(live.stock, Some(6));

    let listed = order_service::list_my_orders(&state, &user)
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].items.len(), 1);

    let fetched = order_service::get_order(&state, &user, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.order_number, created.order.order_number);

    // A different user must not see the order, and must not learn it exists.
    let stranger_id = create_user(&state, "stranger@example.com").await?;
    let stranger = auth_user(stranger_id);
    let err = order_service::get_order(&state, &stranger, created.order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn checkout_with_empty_cart_fails() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "empty@example.com").await?;
    let user = auth_user(user_id);

    let err = order_service::create_order(&state, &user, CreateOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let count = orders::Entity::find().count(&state.orm).await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn checkout_rejects_inactive_product_without_side_effects() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "inactive@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Soon Gone", 500, Some(5), "active").await?;

    cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await?;

    // The product is archived between add-to-cart and checkout.
    let mut active: products::ActiveModel = product.clone().into();
    active.status = Set("archived".to_string());
    active.update(&state.orm).await?;

    let err = order_service::create_order(&state, &user, CreateOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let count = orders::Entity::find().count(&state.orm).await?;
    assert_eq!(count, 0);

    let live = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(live.stock, Some(5), "stock must be untouched");

    Ok(())
}

#[tokio::test]
async fn checkout_rejects_insufficient_stock_without_side_effects() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "shortstock@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Scarce", 500, Some(10), "active").await?;

    cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await?;

    // Stock drops below the requested quantity before checkout.
    let mut active: products::ActiveModel = product.clone().into();
    active.stock = Set(Some(1));
    active.update(&state.orm).await?;

    let err = order_service::create_order(&state, &user, CreateOrderRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let count = orders::Entity::find().count(&state.orm).await?;
    assert_eq!(count, 0);

    let live = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(live.stock, Some(1));

    Ok(())
}

#[tokio::test]
async fn checkout_with_untracked_stock_leaves_stock_null() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "digital@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Downloads").await?;
    let product = create_product(&state, category_id, "Download", 300, None, "active").await?;

    cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 7,
        },
    )
    .await?;

    let created = order_service::create_order(&state, &user, CreateOrderRequest::default())
        .await?
        .data
        .unwrap();
    assert_eq!(created.order.total, 2100);

    let live = products::Entity::find_by_id(product.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(live.stock, None);

    Ok(())
}

#[tokio::test]
async fn order_total_uses_price_snapshot_from_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "snapshot@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Repriced", 1000, Some(10), "active").await?;

    cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?;

    // Price changes after the item was added; the order must keep the
    // price the buyer saw.
    let mut active: products::ActiveModel = product.clone().into();
    active.price = Set(9999);
    active.update(&state.orm).await?;

    let created = order_service::create_order(&state, &user, CreateOrderRequest::default())
        .await?
        .data
        .unwrap();
    assert_eq!(created.order.subtotal, 2000);
    assert_eq!(created.items[0].unit_price, 1000);

    Ok(())
}

#[tokio::test]
async fn order_numbers_are_unique_per_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Bulk", 100, None, "active").await?;

    let mut seen: Vec<String> = Vec::new();
    for i in 0..3 {
        let user_id = create_user(&state, &format!("unique{}@example.com", i)).await?;
        let user = auth_user(user_id);
        cart_service::add_item(
            &state,
            &user,
            AddCartItemRequest {
                product_id: product.id,
                quantity: 1,
            },
        )
        .await?;
        let created = order_service::create_order(&state, &user, CreateOrderRequest::default())
            .await?
            .data
            .unwrap();
        assert!(!seen.contains(&created.order.order_number));
        seen.push(created.order.order_number);
    }

    let count = orders::Entity::find().count(&state.orm).await?;
    assert_eq!(count, 3);

    Ok(())
}
