use argon2::{
    Argon2, PasswordHasher,
    password_hash::{SaltString, rand_core::OsRng},
};
use storefront_api::{config::AppConfig, db::create_pool};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;

    let password = std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "changeme123".into());
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, 'admin')
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("admin@example.com")
    .bind(&password_hash)
    .bind("Admin")
    .execute(&pool)
    .await?;

    let category_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO categories (id, name, description, sort_order)
        VALUES ($1, 'General', 'Default category', 0)
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(category_id)
    .execute(&pool)
    .await?;

    let (existing_category,): (Uuid,) =
        sqlx::query_as("SELECT id FROM categories WHERE name = 'General'")
            .fetch_one(&pool)
            .await?;

    for (name, price, stock) in [
        ("Demo Widget", 1_000_i64, Some(25_i32)),
        ("Demo Gadget", 2_500_i64, Some(10_i32)),
        ("Demo Download", 500_i64, None),
    ] {
        sqlx::query(
            r#"
            INSERT INTO products (id, category_id, name, description, price, stock, status)
            SELECT $1, $2, $3, 'Seeded product', $4, $5, 'active'
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(existing_category)
        .bind(name)
        .bind(price)
        .bind(stock)
        .execute(&pool)
        .await?;
    }

    println!("Seed data applied");
    Ok(())
}
