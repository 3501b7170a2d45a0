pub mod account;
pub mod account_role;
pub mod account_secret;
pub mod department;
pub mod employee;
pub mod employee_department;
pub mod status;
