mod common;

use storefront_api::{
    dto::cart::AddCartItemRequest,
    dto::orders::CreateOrderRequest,
    dto::reviews::CreateReviewRequest,
    error::AppError,
    routes::params::Pagination,
    services::{cart_service, order_service, review_service},
};

use common::{auth_user, create_category, create_product, create_user, setup_state};

fn review(rating: i32) -> CreateReviewRequest {
    CreateReviewRequest {
        rating,
        title: Some("Title".into()),
        comment: Some("Comment".into()),
    }
}

#[tokio::test]
async fn one_review_per_user_and_product() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "reviewer@example.com").await?;
    let user = auth_user(user_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Reviewed", 100, None, "active").await?;

    review_service::create_review(&state, &user, product.id, review(5)).await?;

    let err = review_service::create_review(&state, &user, product.id, review(4))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // The duplicate attempt must not grow the list.
    let listed = review_service::list_product_reviews(&state, product.id, Pagination::default())
        .await?
        .data
        .unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.items[0].rating, 5);

    Ok(())
}

#[tokio::test]
async fn rating_is_bounded() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "bounds@example.com").await?;
    let user = auth_user(user_id);
    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Rated", 100, None, "active").await?;

    for rating in [0, 6, -1] {
        let err = review_service::create_review(&state, &user, product.id, review(rating))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    Ok(())
}

#[tokio::test]
async fn only_the_owner_may_delete() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let owner_id = create_user(&state, "owner@example.com").await?;
    let owner = auth_user(owner_id);
    let other_id = create_user(&state, "other@example.com").await?;
    let other = auth_user(other_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Guarded", 100, None, "active").await?;

    let created = review_service::create_review(&state, &owner, product.id, review(3))
        .await?
        .data
        .unwrap();

    let err = review_service::delete_review(&state, &other, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    review_service::delete_review(&state, &owner, created.id).await?;

    let listed = review_service::list_product_reviews(&state, product.id, Pagination::default())
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    Ok(())
}

#[tokio::test]
async fn review_is_verified_after_a_purchase() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer_id = create_user(&state, "buyer@example.com").await?;
    let buyer = auth_user(buyer_id);
    let browser_id = create_user(&state, "browser@example.com").await?;
    let browser = auth_user(browser_id);

    let category_id = create_category(&state, "Widgets").await?;
    let product = create_product(&state, category_id, "Bought", 100, Some(5), "active").await?;

    cart_service::add_item(
        &state,
        &buyer,
        AddCartItemRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await?;
    order_service::create_order(&state, &buyer, CreateOrderRequest::default()).await?;

    let verified = review_service::create_review(&state, &buyer, product.id, review(5))
        .await?
        .data
        .unwrap();
    assert!(verified.is_verified);

    let unverified = review_service::create_review(&state, &browser, product.id, review(2))
        .await?
        .data
        .unwrap();
    assert!(!unverified.is_verified);

    Ok(())
}
