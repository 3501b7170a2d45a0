mod common;

use std::sync::Arc;

use api::auth::{AuthConfig, Principal, Role};
use api::identity;
use api::schema::{build_schema, AppSchema};
use async_graphql::Request;

fn test_auth() -> Arc<AuthConfig> {
    Arc::new(AuthConfig {
        jwt_secret: "test-secret".into(),
        session_ttl_minutes: 15,
    })
}

#[tokio::test]
async fn me_returns_profile_even_without_roles() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;
    let ada =
        common::create_employee(&db, &admin, "Ada", "Lovelace", "ada@example.test", None).await;
    let account_id = ada.account_id.unwrap();
    // Strip every role; the linked record must still come back.
    identity::remove_role(&db, account_id, Role::Employee)
        .await
        .unwrap();

    let db = Arc::new(db);
    let AppSchema(schema) = build_schema(db.clone(), test_auth());

    let principal = Principal {
        account_id,
        employee_id: Some(ada.id),
        roles: vec![],
    };
    let request = Request::new("{ hr { me { accountId roles employee { id fullName } } } }")
        .data(principal);
    let resp = schema.execute(request).await;
    assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);

    let rendered = resp.data.to_string();
    assert!(rendered.contains(&account_id.to_string()));
    assert!(rendered.contains(&ada.id.to_string()));
    assert!(rendered.contains("Ada Lovelace"));
}

#[tokio::test]
async fn me_without_principal_is_unauthenticated() {
    let db = common::setup_db().await;
    let _ = common::hr_admin(&db).await;

    let db = Arc::new(db);
    let AppSchema(schema) = build_schema(db.clone(), test_auth());

    let resp = schema
        .execute(Request::new("{ hr { me { accountId } } }"))
        .await;
    assert_eq!(resp.errors.len(), 1);
    assert_eq!(resp.errors[0].message, "Login required");
}
