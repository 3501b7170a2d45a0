use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
    FirstName,
    LastName,
    Email,
    Phone,
    ManagerId,
    Status,
    AccountId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Department {
    Table,
    Id,
    Name,
    ManagerId,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum EmployeeDepartment {
    Table,
    Id,
    EmployeeId,
    DepartmentId,
    StartDate,
    EndDate,
    IsActive,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Employee::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Employee::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Employee::FirstName).string_len(100).not_null())
                    .col(ColumnDef::new(Employee::LastName).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Employee::Email)
                            .string_len(256)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employee::Phone).string_len(20))
                    .col(ColumnDef::new(Employee::ManagerId).uuid())
                    .col(
                        ColumnDef::new(Employee::Status)
                            .string_len(16)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(ColumnDef::new(Employee::AccountId).uuid())
                    .col(
                        ColumnDef::new(Employee::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Employee::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // manager_id is an id reference only; no FK action, resolved at read time
        manager
            .create_index(
                Index::create()
                    .name("idx_employee_manager_id")
                    .table(Employee::Table)
                    .col(Employee::ManagerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Department::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Department::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Department::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Department::ManagerId).uuid())
                    .col(
                        ColumnDef::new(Department::Status)
                            .string_len(16)
                            .not_null()
                            .default("ACTIVE"),
                    )
                    .col(
                        ColumnDef::new(Department::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Department::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_department_manager_id")
                    .table(Department::Table)
                    .col(Department::ManagerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmployeeDepartment::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EmployeeDepartment::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(EmployeeDepartment::EmployeeId).uuid().not_null())
                    .col(ColumnDef::new(EmployeeDepartment::DepartmentId).uuid().not_null())
                    .col(
                        ColumnDef::new(EmployeeDepartment::StartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EmployeeDepartment::EndDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(EmployeeDepartment::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_department_employee")
                            .from(EmployeeDepartment::Table, EmployeeDepartment::EmployeeId)
                            .to(Employee::Table, Employee::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_employee_department_department")
                            .from(EmployeeDepartment::Table, EmployeeDepartment::DepartmentId)
                            .to(Department::Table, Department::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // one row per pair; reactivation reuses the row instead of inserting
        manager
            .create_index(
                Index::create()
                    .name("uq_employee_department_pair")
                    .table(EmployeeDepartment::Table)
                    .col(EmployeeDepartment::EmployeeId)
                    .col(EmployeeDepartment::DepartmentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_employee_department_department_id")
                    .table(EmployeeDepartment::Table)
                    .col(EmployeeDepartment::DepartmentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EmployeeDepartment::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Department::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Employee::Table).to_owned())
            .await?;
        Ok(())
    }
}
