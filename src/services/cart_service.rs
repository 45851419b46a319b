use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddCartItemRequest, CartDto, CartItemDto, UpdateCartItemRequest},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
        products::{Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::product_service::product_from_entity,
    state::AppState,
};

/// Get-or-create the user's single cart row. Loses the race to a concurrent
/// insert gracefully by re-reading on a unique violation.
pub async fn ensure_cart<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> AppResult<CartModel> {
    if let Some(cart) = Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(cart);
    }

    let active = CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        subtotal: Set(0),
        created_at: NotSet,
        updated_at: NotSet,
    };

    match active.insert(conn).await {
        Ok(cart) => Ok(cart),
        Err(err) => match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Carts::find()
                .filter(CartCol::UserId.eq(user_id))
                .one(conn)
                .await?
                .ok_or(AppError::NotFound),
            _ => Err(err.into()),
        },
    }
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let cart = ensure_cart(&state.orm, user.user_id).await?;
    let dto = load_cart_dto(&state.orm, cart).await?;
    Ok(ApiResponse::success("OK", dto, None))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".into(),
        ));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::Validation("product not found".into())),
    };
    ensure_purchasable(&product)?;

    let txn = state.orm.begin().await?;

    let cart = ensure_cart(&txn, user.user_id).await?;

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product.id))
        .one(&txn)
        .await?;

    // The stock check covers what the cart would hold after the merge.
    let combined = existing.as_ref().map(|i| i.quantity).unwrap_or(0) + payload.quantity;
    ensure_stock(&product, combined)?;

    match existing {
        Some(item) => {
            // Merge keeps the original price snapshot.
            let mut active: CartItemActive = item.into();
            active.quantity = Set(combined);
            active.update(&txn).await?;
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(payload.quantity),
                price: Set(product.price),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?;
        }
    }

    let cart = recompute_subtotal(&txn, cart.id).await?;
    let dto = load_cart_dto(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Added to cart", dto, None))
}

pub async fn update_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartDto>> {
    if payload.quantity < 1 {
        return Err(AppError::Validation(
            "quantity must be greater than 0".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let (item, cart) = find_owned_item(&txn, user.user_id, item_id).await?;

    let product = Products::find_by_id(item.product_id).one(&txn).await?;
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    ensure_stock(&product, payload.quantity)?;

    let mut active: CartItemActive = item.into();
    active.quantity = Set(payload.quantity);
    active.update(&txn).await?;

    let cart = recompute_subtotal(&txn, cart.id).await?;
    let dto = load_cart_dto(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_update",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": item_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Cart updated", dto, None))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<CartDto>> {
    let txn = state.orm.begin().await?;

    let (item, cart) = find_owned_item(&txn, user.user_id, item_id).await?;

    CartItems::delete_by_id(item.id).exec(&txn).await?;

    let cart = recompute_subtotal(&txn, cart.id).await?;
    let dto = load_cart_dto(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "item_id": item_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Removed from cart", dto, None))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartDto>> {
    let txn = state.orm.begin().await?;

    let cart = ensure_cart(&txn, user.user_id).await?;

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    let cart = recompute_subtotal(&txn, cart.id).await?;
    let dto = load_cart_dto(&txn, cart).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_clear",
        Some("cart_items"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Cart cleared", dto, None))
}

/// Re-read every current line and persist the sum. A full recompute is a
/// little more I/O than an incremental delta but stays correct under
/// interleaved mutations.
pub async fn recompute_subtotal<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<CartModel> {
    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .all(conn)
        .await?;

    let subtotal: i64 = items
        .iter()
        .map(|item| item.price * item.quantity as i64)
        .sum();

    let cart = Carts::find_by_id(cart_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: CartActive = cart.into();
    active.subtotal = Set(subtotal);
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

/// Resolve a cart item through its cart's owner; a foreign item is
/// indistinguishable from a missing one.
async fn find_owned_item<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<(CartItemModel, CartModel)> {
    let item = CartItems::find_by_id(item_id).one(conn).await?;
    let item = match item {
        Some(i) => i,
        None => return Err(AppError::NotFound),
    };

    let cart = Carts::find_by_id(item.cart_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    if cart.user_id != user_id {
        return Err(AppError::NotFound);
    }

    Ok((item, cart))
}

fn ensure_purchasable(product: &ProductModel) -> Result<(), AppError> {
    if product.status != "active" {
        return Err(AppError::BusinessRule(format!(
            "Product {} is not available",
            product.name
        )));
    }
    Ok(())
}

fn ensure_stock(product: &ProductModel, quantity: i32) -> Result<(), AppError> {
    if let Some(stock) = product.stock {
        if stock < quantity {
            return Err(AppError::BusinessRule(format!(
                "Insufficient stock for {}",
                product.name
            )));
        }
    }
    Ok(())
}

async fn load_cart_dto<C: ConnectionTrait>(conn: &C, cart: CartModel) -> AppResult<CartDto> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .find_also_related(Products)
        .all(conn)
        .await?;

    let items = rows
        .into_iter()
        .filter_map(|(item, product)| {
            product.map(|p| CartItemDto {
                id: item.id,
                product: product_from_entity(p),
                quantity: item.quantity,
                price: item.price,
            })
        })
        .collect();

    Ok(CartDto {
        id: cart.id,
        items,
        subtotal: cart.subtotal,
    })
}
