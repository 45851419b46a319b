use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, SqlErr, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::ApiResponse,
    state::AppState,
};

/// Convert the user's cart into an immutable order.
///
/// Runs as one transaction: validation against live products (locked for
/// update), order + item inserts, floored stock decrements and the cart
/// clear either all commit or all roll back.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .one(&txn)
        .await?;
    let cart = match cart {
        Some(c) => c,
        None => return Err(AppError::BusinessRule("Cart is empty".into())),
    };

    let items = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .all(&txn)
        .await?;
    if items.is_empty() {
        return Err(AppError::BusinessRule("Cart is empty".into()));
    }

    // Cart lines are only a proposal; availability is re-checked here
    // against the live product rows, locked until commit.
    let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, _> = Products::find()
        .filter(ProdCol::Id.is_in(product_ids))
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut subtotal: i64 = 0;
    for item in &items {
        let product = products
            .get(&item.product_id)
            .ok_or_else(|| AppError::BusinessRule("Product is no longer available".into()))?;
        if product.status != "active" {
            return Err(AppError::BusinessRule(format!(
                "Product {} is not available",
                product.name
            )));
        }
        if let Some(stock) = product.stock {
            if stock < item.quantity {
                return Err(AppError::BusinessRule(format!(
                    "Insufficient stock for {}",
                    product.name
                )));
            }
        }
        // Price-at-add semantics: totals come from the cart snapshot,
        // not a fresh product price lookup.
        subtotal += item.price * item.quantity as i64;
    }

    let customer = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let tax: i64 = 0;
    let shipping: i64 = 0;
    let discount: i64 = 0;
    let total = subtotal + tax + shipping - discount;

    let order_id = Uuid::new_v4();
    let order_number = build_order_number();

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(order_number),
        user_id: Set(user.user_id),
        customer_name: Set(customer.name),
        subtotal: Set(subtotal),
        tax: Set(tax),
        shipping: Set(shipping),
        discount: Set(discount),
        total: Set(total),
        shipping_address: Set(payload.shipping_address),
        billing_address: Set(payload.billing_address),
        created_at: NotSet,
    };
    let order = match order.insert(&txn).await {
        Ok(o) => o,
        Err(err) => match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                return Err(AppError::Conflict(
                    "Order number collision, please retry".into(),
                ));
            }
            _ => return Err(err.into()),
        },
    };

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(items.len());
    for item in &items {
        let product = &products[&item.product_id];
        let line_total = item.price * item.quantity as i64;
        let persisted = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            product_name: Set(product.name.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.price),
            line_total: Set(line_total),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
        order_items.push(order_item_from_entity(persisted));
    }

    // Decrement stock on tracked products, floored at zero. The rows are
    // locked, so the read-modify-write cannot race.
    for item in &items {
        let product = &products[&item.product_id];
        if let Some(stock) = product.stock {
            let mut active: ProductActive = product.clone().into();
            active.stock = Set(Some((stock - item.quantity).max(0)));
            active.updated_at = Set(Utc::now().into());
            active.update(&txn).await?;
        }
    }

    // Empty the cart; the row itself persists for reuse.
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    let mut cart_active: CartActive = cart.into();
    cart_active.subtotal = Set(0);
    cart_active.updated_at = Set(Utc::now().into());
    cart_active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "total": order.total })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order),
            items: order_items,
        },
        None,
    ))
}

pub async fn list_my_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .all(&state.orm)
        .await?;

    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items_by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    if !order_ids.is_empty() {
        for item in OrderItems::find()
            .filter(OrderItemCol::OrderId.is_in(order_ids))
            .all(&state.orm)
            .await?
        {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(order_item_from_entity(item));
        }
    }

    let items = orders
        .into_iter()
        .map(|order| {
            let order_items = items_by_order.remove(&order.id).unwrap_or_default();
            OrderWithItems {
                order: order_from_entity(order),
                items: order_items,
            }
        })
        .collect();

    Ok(ApiResponse::success("Orders", OrderList { items }, None))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    // Scoped by owner; a foreign order reads as missing.
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order),
            items,
        },
        None,
    ))
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        order_number: model.order_number,
        user_id: model.user_id,
        customer_name: model.customer_name,
        subtotal: model.subtotal,
        tax: model.tax,
        shipping: model.shipping,
        discount: model.discount,
        total: model.total,
        shipping_address: model.shipping_address,
        billing_address: model.billing_address,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        line_total: model.line_total,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

/// Display-grade order number: timestamp plus a short random suffix. The
/// unique index on orders.order_number turns the rare collision into a
/// conflict instead of a silent overwrite.
pub fn build_order_number() -> String {
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ORD-{}-{}", stamp, &suffix[..6])
}
