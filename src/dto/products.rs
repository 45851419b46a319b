use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Product, ProductImage, ProductVariant};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    pub url: String,
    pub alt_text: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantPayload {
    pub name: String,
    pub value: String,
    pub price_delta: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: Option<i32>,
    pub featured: Option<bool>,
    pub status: Option<String>,
    pub images: Option<Vec<ImagePayload>>,
    pub variants: Option<Vec<VariantPayload>>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    // Some(None) cannot be expressed here; a null stock is set via `trackStock: false`.
    pub stock: Option<i32>,
    pub track_stock: Option<bool>,
    pub featured: Option<bool>,
    pub status: Option<String>,
    pub images: Option<Vec<ImagePayload>>,
    pub variants: Option<Vec<VariantPayload>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub product: Product,
    pub images: Vec<ProductImage>,
    pub variants: Vec<ProductVariant>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
