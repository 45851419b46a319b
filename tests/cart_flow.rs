mod common;

use storefront_api::{
    dto::cart::{AddCartItemRequest, UpdateCartItemRequest},
    error::AppError,
    services::cart_service,
};

use common::{auth_user, create_category, create_product, create_user, setup_state};

#[tokio::test]
async fn subtotal_tracks_every_mutation() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "cart@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let widget = create_product(&state, category_id, "Widget", 1000, Some(50), "active").await?;
    let gadget = create_product(&state, category_id, "Gadget", 2500, Some(50), "active").await?;

    let cart = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: widget.id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.subtotal, 2000);

    let cart = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: gadget.id,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 2);
    assert_eq!(cart.subtotal, 4500);

    let widget_item = cart
        .items
        .iter()
        .find(|i| i.product.id == widget.id)
        .unwrap();
    let cart = cart_service::update_item(
        &state,
        &user,
        widget_item.id,
        UpdateCartItemRequest { quantity: 5 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.subtotal, 5000 + 2500);

    let gadget_item = cart
        .items
        .iter()
        .find(|i| i.product.id == gadget.id)
        .unwrap();
    let cart = cart_service::remove_item(&state, &user, gadget_item.id)
        .await?
        .data
        .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.subtotal, 5000);

    let cart = cart_service::clear_cart(&state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, 0);

    Ok(())
}

#[tokio::test]
async fn get_cart_lazily_creates_one_cart_per_user() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "lazy@example.com").await?;
    let user = auth_user(user_id);

    let first = cart_service::get_cart(&state, &user).await?.data.unwrap();
    let second = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(first.id, second.id);
    assert!(first.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn add_item_validates_product_and_quantity() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "invalid@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let draft = create_product(&state, category_id, "Draft Item", 1000, Some(5), "draft").await?;
    let scarce = create_product(&state, category_id, "Scarce Item", 1000, Some(3), "active").await?;

    let err = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: uuid::Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: scarce.id,
            quantity: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: draft.id,
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    // The combined quantity across add calls is what the stock check sees.
    cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: scarce.id,
            quantity: 2,
        },
    )
    .await?;
    let err = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: scarce.id,
            quantity: 2,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    Ok(())
}

#[tokio::test]
async fn cart_items_are_scoped_to_their_owner() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let owner_id = create_user(&state, "owner@example.com").await?;
    let owner = auth_user(owner_id);
    let intruder_id = create_user(&state, "intruder@example.com").await?;
    let intruder = auth_user(intruder_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Private", 1000, Some(5), "active").await?;

    let cart = cart_service::add_item(
        &state,
        &owner,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    let item_id = cart.items[0].id;

    let err = cart_service::update_item(
        &state,
        &intruder,
        item_id,
        UpdateCartItemRequest { quantity: 2 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let err = cart_service::remove_item(&state, &intruder, item_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // The owner's cart is untouched.
    let cart = cart_service::get_cart(&state, &owner).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 1);

    Ok(())
}

#[tokio::test]
async fn merged_line_keeps_original_price_snapshot() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "pricelock@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Volatile", 1000, Some(10), "active").await?;

    cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await?;

    use sea_orm::{ActiveModelTrait, Set};
    let mut active: storefront_api::entity::products::ActiveModel = product.clone().into();
    active.price = Set(2000);
    active.update(&state.orm).await?;

    let cart = cart_service::add_item(
        &state,
        &user,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.items[0].price, 1000);
    assert_eq!(cart.subtotal, 2000);

    Ok(())
}
