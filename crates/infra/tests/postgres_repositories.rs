//! Round trips against a live Postgres.
//!
//! Ignored by default. Run with a disposable database:
//! `DATABASE_URL=postgres://... cargo test -p nexus-infra -- --ignored`

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use nexus_auth::seed;
use nexus_auth::{Action, Permission, Resource, Role, Scope};
use nexus_infra::{
    PermissionWriter, PostgresPermissionRepository, PostgresPrincipalRepository, PrincipalWriter,
    ensure_schema, seed_catalog, seed_principals,
};

async fn pool() -> Arc<sqlx::PgPool> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for ignored tests");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect");
    ensure_schema(&pool).await.expect("schema");
    seed_catalog(&pool).await.expect("seed catalog");
    seed_principals(&pool, &seed::demo_principals())
        .await
        .expect("seed principals");
    Arc::new(pool)
}

#[tokio::test]
#[ignore]
async fn seeded_snapshot_contains_default_grants() {
    let repo = PostgresPermissionRepository::new(pool().await);
    let snapshot = repo.load_snapshot().await.unwrap();

    assert!(snapshot.is_granted(
        Role::Finance,
        &Permission::new(Action::Approve, Resource::Financial, Scope::Any)
    ));
    assert!(snapshot.is_granted(
        Role::Auditor,
        &Permission::new(Action::Read, Resource::Executive, Scope::Any)
    ));
}

#[tokio::test]
#[ignore]
async fn grant_then_revoke_is_visible_in_the_next_snapshot() {
    let repo = PostgresPermissionRepository::new(pool().await);
    let permission = Permission::new(Action::Create, Resource::Financial, Scope::Report);

    repo.grant(Role::Staff, permission).await.unwrap();
    assert!(!repo.grant(Role::Staff, permission).await.unwrap(), "second grant is a no-op");
    assert!(repo.load_snapshot().await.unwrap().is_granted(Role::Staff, &permission));

    assert!(repo.revoke(Role::Staff, permission).await.unwrap());
    assert!(!repo.load_snapshot().await.unwrap().is_granted(Role::Staff, &permission));
}

#[tokio::test]
#[ignore]
async fn assign_role_replaces_the_single_role() {
    let pool = pool().await;
    let repo = PostgresPrincipalRepository::new(pool);
    let user_id = seed::demo_user_id(Role::Marketing);

    repo.assign_role(user_id, Role::Staff).await.unwrap();
    let entry = repo
        .load_all()
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.principal.user_id == user_id)
        .unwrap();
    assert_eq!(entry.principal.role, Role::Staff);

    repo.assign_role(user_id, Role::Marketing).await.unwrap();
}
