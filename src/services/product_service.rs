use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{
        CreateProductRequest, ImagePayload, ProductDetail, ProductList, UpdateProductRequest,
        VariantPayload,
    },
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        categories::Entity as Categories,
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_images::{ActiveModel as ImageActive, Column as ImageCol, Entity as ProductImages},
        product_variants::{
            ActiveModel as VariantActive, Column as VariantCol, Entity as ProductVariants,
        },
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Product, ProductImage, ProductVariant},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const VALID_STATUSES: [&str; 4] = ["draft", "active", "archived", "out_of_stock"];

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        validate_status(status)?;
        condition = condition.add(Column::Status.eq(status.clone()));
    }

    if let Some(featured) = query.featured {
        condition = condition.add(Column::Featured.eq(featured));
    }

    if let Some(category_id) = query.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    let data = ProductList { items };
    Ok(ApiResponse::success("Products", data, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let result = Products::find_by_id(id).one(&state.orm).await?;
    let product = match result {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let images = ProductImages::find()
        .filter(ImageCol::ProductId.eq(id))
        .order_by_asc(ImageCol::Position)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|m| ProductImage {
            id: m.id,
            url: m.url,
            alt_text: m.alt_text,
            position: m.position,
        })
        .collect();

    let variants = ProductVariants::find()
        .filter(VariantCol::ProductId.eq(id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|m| ProductVariant {
            id: m.id,
            name: m.name,
            value: m.value,
            price_delta: m.price_delta,
        })
        .collect();

    let data = ProductDetail {
        product: product_from_entity(product),
        images,
        variants,
    };
    Ok(ApiResponse::success("Product", data, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".into()));
    }
    if payload.price < 0 {
        return Err(AppError::Validation("Price must not be negative".into()));
    }
    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::Validation("Stock must not be negative".into()));
        }
    }
    let status = payload.status.unwrap_or_else(|| "draft".to_string());
    validate_status(&status)?;

    let category = Categories::find_by_id(payload.category_id)
        .one(&state.orm)
        .await?;
    if category.is_none() {
        return Err(AppError::Validation("Category does not exist".into()));
    }

    let id = Uuid::new_v4();
    let txn = state.orm.begin().await?;

    let active = ActiveModel {
        id: Set(id),
        category_id: Set(payload.category_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        stock: Set(payload.stock),
        featured: Set(payload.featured.unwrap_or(false)),
        status: Set(status),
        created_at: NotSet,
        updated_at: NotSet,
    };
    let product = active.insert(&txn).await?;

    let images = insert_images(&txn, id, payload.images.unwrap_or_default()).await?;
    let variants = insert_variants(&txn, id, payload.variants.unwrap_or_default()).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        ProductDetail {
            product: product_from_entity(product),
            images,
            variants,
        },
        None,
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    if let Some(price) = payload.price {
        if price < 0 {
            return Err(AppError::Validation("Price must not be negative".into()));
        }
    }
    if let Some(stock) = payload.stock {
        if stock < 0 {
            return Err(AppError::Validation("Stock must not be negative".into()));
        }
    }
    if let Some(status) = payload.status.as_ref() {
        validate_status(status)?;
    }
    if let Some(category_id) = payload.category_id {
        let category = Categories::find_by_id(category_id).one(&state.orm).await?;
        if category.is_none() {
            return Err(AppError::Validation("Category does not exist".into()));
        }
    }

    let txn = state.orm.begin().await?;

    let mut active: ActiveModel = existing.into();
    if let Some(category_id) = payload.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Product name is required".into()));
        }
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if payload.track_stock == Some(false) {
        active.stock = Set(None);
    } else if let Some(stock) = payload.stock {
        active.stock = Set(Some(stock));
    }
    if let Some(featured) = payload.featured {
        active.featured = Set(featured);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    active.updated_at = Set(Utc::now().into());

    let product = active.update(&txn).await?;

    let images = match payload.images {
        Some(images) => {
            ProductImages::delete_many()
                .filter(ImageCol::ProductId.eq(id))
                .exec(&txn)
                .await?;
            insert_images(&txn, id, images).await?
        }
        None => load_images(&txn, id).await?,
    };

    let variants = match payload.variants {
        Some(variants) => {
            ProductVariants::delete_many()
                .filter(VariantCol::ProductId.eq(id))
                .exec(&txn)
                .await?;
            insert_variants(&txn, id, variants).await?
        }
        None => load_variants(&txn, id).await?,
    };

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        ProductDetail {
            product: product_from_entity(product),
            images,
            variants,
        },
        None,
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let referenced = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if referenced > 0 {
        return Err(AppError::BusinessRule(
            "Product belongs to existing orders and cannot be deleted".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    // Dangling cart lines go with the product.
    CartItems::delete_many()
        .filter(CartItemCol::ProductId.eq(id))
        .exec(&txn)
        .await?;

    let result = Products::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Deleted", serde_json::json!({}), None))
}

fn validate_status(status: &str) -> Result<(), AppError> {
    if VALID_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid product status".into()))
    }
}

async fn insert_images<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    payloads: Vec<ImagePayload>,
) -> AppResult<Vec<ProductImage>> {
    let mut images = Vec::with_capacity(payloads.len());
    for (idx, payload) in payloads.into_iter().enumerate() {
        let model = ImageActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            url: Set(payload.url),
            alt_text: Set(payload.alt_text),
            position: Set(payload.position.unwrap_or(idx as i32)),
        }
        .insert(conn)
        .await?;
        images.push(ProductImage {
            id: model.id,
            url: model.url,
            alt_text: model.alt_text,
            position: model.position,
        });
    }
    Ok(images)
}

async fn insert_variants<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    payloads: Vec<VariantPayload>,
) -> AppResult<Vec<ProductVariant>> {
    let mut variants = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let model = VariantActive {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            name: Set(payload.name),
            value: Set(payload.value),
            price_delta: Set(payload.price_delta.unwrap_or(0)),
        }
        .insert(conn)
        .await?;
        variants.push(ProductVariant {
            id: model.id,
            name: model.name,
            value: model.value,
            price_delta: model.price_delta,
        });
    }
    Ok(variants)
}

async fn load_images<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> AppResult<Vec<ProductImage>> {
    Ok(ProductImages::find()
        .filter(ImageCol::ProductId.eq(product_id))
        .order_by_asc(ImageCol::Position)
        .all(conn)
        .await?
        .into_iter()
        .map(|m| ProductImage {
            id: m.id,
            url: m.url,
            alt_text: m.alt_text,
            position: m.position,
        })
        .collect())
}

async fn load_variants<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> AppResult<Vec<ProductVariant>> {
    Ok(ProductVariants::find()
        .filter(VariantCol::ProductId.eq(product_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| ProductVariant {
            id: m.id,
            name: m.name,
            value: m.value,
            price_delta: m.price_delta,
        })
        .collect())
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        category_id: model.category_id,
        name: model.name,
        description: model.description,
        price: model.price,
        stock: model.stock,
        featured: model.featured,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
