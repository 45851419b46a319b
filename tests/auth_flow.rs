mod common;

use storefront_api::{
    dto::auth::{LoginRequest, RegisterRequest},
    error::AppError,
    services::auth_service,
};

use common::setup_state;

fn set_jwt_secret() {
    // SAFETY: tests touch the environment before spawning any other thread.
    unsafe { std::env::set_var("JWT_SECRET", "test-secret") };
}

fn register(email: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: "correct horse".into(),
        name: "Alex".into(),
        phone: None,
    }
}

#[tokio::test]
async fn register_login_and_lookup() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    set_jwt_secret();

    let created = auth_service::register_user(&state.pool, register("alex@example.com"))
        .await?
        .data
        .unwrap();
    assert!(!created.token.is_empty());
    assert_eq!(created.user.email, "alex@example.com");
    assert_eq!(created.user.role, "customer");

    let logged_in = auth_service::login_user(
        &state.pool,
        LoginRequest {
            email: "Alex@Example.com".into(),
            password: "correct horse".into(),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(logged_in.user.id, created.user.id);

    let me = auth_service::current_user(&state.pool, created.user.id)
        .await?
        .data
        .unwrap();
    assert_eq!(me.email, "alex@example.com");

    Ok(())
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    set_jwt_secret();

    auth_service::register_user(&state.pool, register("taken@example.com")).await?;

    let err = auth_service::register_user(&state.pool, register("taken@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    Ok(())
}

#[tokio::test]
async fn register_validates_input() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    set_jwt_secret();

    let err = auth_service::register_user(&state.pool, register("not-an-email"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let mut short = register("short@example.com");
    short.password = "short".into();
    let err = auth_service::register_user(&state.pool, short)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn wrong_password_is_rejected_vaguely() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    set_jwt_secret();

    auth_service::register_user(&state.pool, register("victim@example.com")).await?;

    let err = auth_service::login_user(
        &state.pool,
        LoginRequest {
            email: "victim@example.com".into(),
            password: "wrong".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.to_string(), "Invalid email or password");

    // Unknown account reads the same as a bad password.
    let err = auth_service::login_user(
        &state.pool,
        LoginRequest {
            email: "nobody@example.com".into(),
            password: "wrong".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");

    Ok(())
}
