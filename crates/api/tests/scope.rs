mod common;

use api::auth::{Principal, Role};
use api::error::HrError;
use api::{departments, employees};
use uuid::Uuid;

#[tokio::test]
async fn hr_admin_sees_every_record() {
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
    common::create_department(&db, &admin, "Support", None).await;
    departments::assign_employees(&db, &admin, engineering.id, &[worker.id])
        .await
        .unwrap();

    let all = employees::list(&db, &admin, None).await.unwrap();
    assert_eq!(all.len(), 2);
    let depts = departments::list(&db, &admin, None).await.unwrap();
    assert_eq!(depts.len(), 2);
}

#[tokio::test]
async fn manager_scope_covers_assignees_and_self() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let manager =
        common::create_employee(&db, &admin, "Mona", "Chief", "mona@example.test", None).await;
    let a = common::create_employee(&db, &admin, "Ada", "One", "ada@example.test", None).await;
    let b = common::create_employee(&db, &admin, "Ben", "Two", "ben@example.test", None).await;
    let outsider =
        common::create_employee(&db, &admin, "Olga", "Out", "olga@example.test", None).await;

    let engineering =
        common::create_department(&db, &admin, "Engineering", Some(manager.id)).await;
    let support = common::create_department(&db, &admin, "Support", None).await;
    departments::assign_employees(&db, &admin, engineering.id, &[a.id, b.id])
        .await
        .unwrap();
    departments::assign_employees(&db, &admin, support.id, &[outsider.id])
        .await
        .unwrap();

    let principal = common::principal_for(&db, manager.id).await;
    assert!(principal.has_role(Role::Manager));

    let visible = employees::list(&db, &principal, None).await.unwrap();
    let mut names: Vec<String> = visible
        .iter()
        .map(|r| r.employee.first_name.clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Ada", "Ben", "Mona"]);

    let depts = departments::list(&db, &principal, None).await.unwrap();
    assert_eq!(depts.len(), 1);
    assert_eq!(depts[0].department.name, "Engineering");

    let err = employees::get(&db, &principal, outsider.id).await.unwrap_err();
    assert!(matches!(err, HrError::Forbidden));
    let err = departments::get(&db, &principal, support.id).await.unwrap_err();
    assert!(matches!(err, HrError::Forbidden));
}

#[tokio::test]
async fn employee_scope_is_self_and_assigned_departments() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let a = common::create_employee(&db, &admin, "Ada", "One", "ada@example.test", None).await;
    let b = common::create_employee(&db, &admin, "Ben", "Two", "ben@example.test", None).await;
    let engineering = common::create_department(&db, &admin, "Engineering", None).await;
    let support = common::create_department(&db, &admin, "Support", None).await;
    departments::assign_employees(&db, &admin, engineering.id, &[a.id, b.id])
        .await
        .unwrap();
    departments::assign_employees(&db, &admin, support.id, &[b.id])
        .await
        .unwrap();

    let principal = common::principal_for(&db, a.id).await;
    let visible = employees::list(&db, &principal, None).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].employee.id, a.id);

    let depts = departments::list(&db, &principal, None).await.unwrap();
    assert_eq!(depts.len(), 1);
    assert_eq!(depts[0].department.id, engineering.id);

    let err = employees::get(&db, &principal, b.id).await.unwrap_err();
    assert!(matches!(err, HrError::Forbidden));
    let err = departments::get(&db, &principal, support.id).await.unwrap_err();
    assert!(matches!(err, HrError::Forbidden));
}

#[tokio::test]
async fn unlinked_principal_is_forbidden_not_empty() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;
    common::create_employee(&db, &admin, "Ada", "One", "ada@example.test", None).await;

    // Account with a role but no employee record behind it.
    let unlinked = Principal {
        account_id: Uuid::new_v4(),
        employee_id: None,
        roles: vec![Role::Employee],
    };
    let err = employees::list(&db, &unlinked, None).await.unwrap_err();
    assert!(matches!(err, HrError::Forbidden));

    // Linked but roleless accounts are rejected the same way.
    let roleless = Principal {
        account_id: Uuid::new_v4(),
        employee_id: Some(Uuid::new_v4()),
        roles: vec![],
    };
    let err = departments::list(&db, &roleless, None).await.unwrap_err();
    assert!(matches!(err, HrError::Forbidden));
}

#[tokio::test]
async fn manager_scope_survives_a_status_flip() {
    let db = common::setup_db().await;
    let admin = common::hr_admin(&db).await;

    let manager =
        common::create_employee(&db, &admin, "Mona", "Chief", "mona@example.test", None).await;
    let worker =
        common::create_employee(&db, &admin, "Will", "Worker", "will@example.test", None).await;
    let dept = common::create_department(&db, &admin, "Engineering", Some(manager.id)).await;
    departments::assign_employees(&db, &admin, dept.id, &[worker.id])
        .await
        .unwrap();

    // Flipping the department Inactive through update keeps the manager and
    // the assignments in place; only the status changes.
    departments::update(
        &db,
        &admin,
        api::departments::UpdateDepartment {
            id: dept.id,
            name: "Engineering".into(),
            manager_id: Some(manager.id),
            status: entity::status::RecordStatus::Inactive,
        },
    )
    .await
    .unwrap();

    let principal = common::principal_for(&db, manager.id).await;
    assert!(principal.has_role(Role::Manager));

    let visible = employees::list(&db, &principal, None).await.unwrap();
    let mut ids: Vec<_> = visible.iter().map(|r| r.employee.id).collect();
    ids.sort();
    let mut expected = vec![manager.id, worker.id];
    expected.sort();
    assert_eq!(ids, expected);

    let depts = departments::list(&db, &principal, None).await.unwrap();
    assert_eq!(depts.len(), 1);
    assert_eq!(depts[0].department.id, dept.id);
}
