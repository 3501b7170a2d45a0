mod common;

use api::auth::Role;
use api::employees::{self, NewEmployee, UpdateEmployee};
use api::error::HrError;
use api::{departments, identity};
use entity::status::RecordStatus;
use entity::{account, account_secret, employee_department};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
};

#[tokio::test]
async fn create_provisions_linked_account_with_employee_role() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let model =
        common::create_employee(&db, &admin, "Ada", "Lovelace", "ada@example.test", None).await;
    let account_id = model.account_id.expect("account link set");

    let account = account::Entity::find_by_id(account_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.email, "ada@example.test");
    assert_eq!(account.employee_id, Some(model.id));
    assert!(identity::has_role(&db, account_id, Role::Employee)
        .await
        .unwrap());
    assert!(!identity::has_role(&db, account_id, Role::HrAdministrator)
        .await
        .unwrap());

    let secret = account_secret::Entity::find_by_id(account_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(identity::verify_password(
        identity::DEFAULT_PASSWORD,
        &secret.password_hash
    ));
}

#[tokio::test]
async fn create_normalizes_and_rejects_duplicate_email() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    common::create_employee(&db, &admin, "Ada", "Lovelace", "ada@example.test", None).await;
    let err = employees::create(
        &db,
        &admin,
        NewEmployee {
            first_name: "Imposter".into(),
            last_name: "Person".into(),
            email: "  ADA@Example.Test ".into(),
            phone: None,
            manager_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HrError::Validation(_)));

    let count = entity::employee::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn provisioning_conflict_saves_employee_with_warning() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    // An account already owns the address; employee creation must still
    // succeed, minus the link.
    identity::create_account(&db, "taken@example.test", None, identity::DEFAULT_PASSWORD)
        .await
        .unwrap();
    let (record, warning) = employees::create(
        &db,
        &admin,
        NewEmployee {
            first_name: "Tess".into(),
            last_name: "Taken".into(),
            email: "taken@example.test".into(),
            phone: None,
            manager_id: None,
        },
    )
    .await
    .unwrap();
    assert!(warning.is_some());
    assert_eq!(record.employee.account_id, None);
    assert_eq!(record.employee.status, RecordStatus::Active);
}

#[tokio::test]
async fn non_admin_update_cannot_touch_manager_or_status() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let manager =
        common::create_employee(&db, &admin, "Mona", "Chief", "mona@example.test", None).await;
    let worker = common::create_employee(
        &db,
        &admin,
        "Will",
        "Worker",
        "will@example.test",
        Some(manager.id),
    )
    .await;

    let principal = common::principal_for(&db, worker.id).await;
    let updated = employees::update(
        &db,
        &principal,
        UpdateEmployee {
            id: worker.id,
            first_name: "Wilhelm".into(),
            last_name: "Worker".into(),
            email: "will@example.test".into(),
            phone: Some("555-0100".into()),
            manager_id: None,
            status: RecordStatus::Inactive,
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.employee.first_name, "Wilhelm");
    assert_eq!(updated.employee.phone.as_deref(), Some("555-0100"));
    // Submitted manager/status changes are discarded for non-admins.
    assert_eq!(updated.employee.manager_id, Some(manager.id));
    assert_eq!(updated.employee.status, RecordStatus::Active);
}

#[tokio::test]
async fn manager_assignment_rejects_self_and_cycles() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let top = common::create_employee(&db, &admin, "Top", "Boss", "top@example.test", None).await;
    let mid = common::create_employee(
        &db,
        &admin,
        "Mid",
        "Lead",
        "mid@example.test",
        Some(top.id),
    )
    .await;

    let err = employees::update(
        &db,
        &admin,
        UpdateEmployee {
            id: mid.id,
            first_name: mid.first_name.clone(),
            last_name: mid.last_name.clone(),
            email: mid.email.clone(),
            phone: None,
            manager_id: Some(mid.id),
            status: RecordStatus::Active,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HrError::Validation(_)));

    // top -> mid would close the loop mid -> top.
    let err = employees::update(
        &db,
        &admin,
        UpdateEmployee {
            id: top.id,
            first_name: top.first_name.clone(),
            last_name: top.last_name.clone(),
            email: top.email.clone(),
            phone: None,
            manager_id: Some(mid.id),
            status: RecordStatus::Active,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HrError::Validation(_)));
}

#[tokio::test]
async fn soft_delete_closes_assignments_and_locks_account() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let manager =
        common::create_employee(&db, &admin, "Mona", "Chief", "mona@example.test", None).await;
    let worker = common::create_employee(
        &db,
        &admin,
        "Will",
        "Worker",
        "will@example.test",
        Some(manager.id),
    )
    .await;
    let engineering =
        common::create_department(&db, &admin, "Engineering", Some(manager.id)).await;
    let support = common::create_department(&db, &admin, "Support", None).await;
    departments::assign_employees(&db, &admin, engineering.id, &[worker.id])
        .await
        .unwrap();
    departments::assign_employees(&db, &admin, support.id, &[worker.id])
        .await
        .unwrap();

    let report = employees::soft_delete(&db, &admin, worker.id).await.unwrap();
    assert_eq!(report.managed_departments, 0);
    assert_eq!(report.subordinates, 0);

    let stored = entity::employee::Entity::find_by_id(worker.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RecordStatus::Inactive);

    let assignments = employee_department::Entity::find()
        .filter(employee_department::Column::EmployeeId.eq(worker.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(assignments.len(), 2);
    for assignment in assignments {
        assert!(!assignment.is_active);
        assert!(assignment.end_date.is_some());
    }

    let account = account::Entity::find_by_id(stored.account_id.unwrap())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(identity::is_locked(&account));

    // Soft delete, not removal: the record stays fetchable by id.
    let fetched = employees::get(&db, &admin, worker.id).await.unwrap();
    assert_eq!(fetched.employee.status, RecordStatus::Inactive);

    // The manager report counts what the deleted record left behind.
    let report = employees::soft_delete(&db, &admin, manager.id).await.unwrap();
    assert_eq!(report.managed_departments, 1);
    assert_eq!(report.subordinates, 1);
}

#[tokio::test]
async fn reset_password_requires_a_linked_account() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    identity::create_account(&db, "taken@example.test", None, identity::DEFAULT_PASSWORD)
        .await
        .unwrap();
    let (record, _) = employees::create(
        &db,
        &admin,
        NewEmployee {
            first_name: "Tess".into(),
            last_name: "Taken".into(),
            email: "taken@example.test".into(),
            phone: None,
            manager_id: None,
        },
    )
    .await
    .unwrap();
    let err = employees::reset_password(&db, &admin, record.employee.id)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::NotFound));

    let linked =
        common::create_employee(&db, &admin, "Ada", "Lovelace", "ada@example.test", None).await;
    employees::reset_password(&db, &admin, linked.id).await.unwrap();
    let secret = account_secret::Entity::find_by_id(linked.account_id.unwrap())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(identity::verify_password(
        identity::DEFAULT_PASSWORD,
        &secret.password_hash
    ));
    assert!(secret.reset_token_hash.is_none());
}

#[tokio::test]
async fn reset_tokens_are_single_use_and_validated() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;
    let ada =
        common::create_employee(&db, &admin, "Ada", "Lovelace", "ada@example.test", None).await;
    let account_id = ada.account_id.unwrap();

    let token = identity::generate_reset_token(&db, account_id).await.unwrap();
    identity::reset_password(&db, account_id, &token, "Fresh1#pass")
        .await
        .unwrap();

    // Consumed on use.
    let err = identity::reset_password(&db, account_id, &token, "Again1#pass")
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::AccountOperation(_)));

    // Wrong token.
    identity::generate_reset_token(&db, account_id).await.unwrap();
    let err = identity::reset_password(&db, account_id, "not-the-token", "Again1#pass")
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::AccountOperation(_)));

    // Expired token.
    let token = identity::generate_reset_token(&db, account_id).await.unwrap();
    let secret = account_secret::Entity::find_by_id(account_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut active: account_secret::ActiveModel = secret.into();
    active.reset_token_expires = Set(Some((Utc::now() - Duration::hours(1)).into()));
    active.update(&db).await.unwrap();
    let err = identity::reset_password(&db, account_id, &token, "Again1#pass")
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::AccountOperation(_)));

    // Only the successful reset took effect.
    let secret = account_secret::Entity::find_by_id(account_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(identity::verify_password("Fresh1#pass", &secret.password_hash));
}

#[tokio::test]
async fn mutations_are_reserved_to_hr_admins() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;
    let worker =
        common::create_employee(&db, &admin, "Will", "Worker", "will@example.test", None).await;
    let principal = common::principal_for(&db, worker.id).await;

    let err = employees::create(
        &db,
        &principal,
        NewEmployee {
            first_name: "New".into(),
            last_name: "Hire".into(),
            email: "new@example.test".into(),
            phone: None,
            manager_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, HrError::Forbidden));

    let err = employees::soft_delete(&db, &principal, worker.id)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::Forbidden));

    let err = employees::reset_password(&db, &principal, worker.id)
        .await
        .unwrap_err();
    assert!(matches!(err, HrError::Forbidden));
}
