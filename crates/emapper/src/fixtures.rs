//! Entity types shared by unit tests.

use crate::entity::EntityBase;
use emapper_derive::Entity;

#[derive(Debug, Default, Entity)]
#[orm(table = "newcrm_user", alias = "u")]
pub struct User {
    #[orm(base)]
    pub base: EntityBase,
    #[orm(required, len = "4..=10")]
    pub name: String,
    #[orm(required)]
    pub login_password: String,
    #[orm(column = "is_admin")]
    pub admin: bool,
    pub age: i32,
    #[orm(email)]
    pub email: Option<String>,
    #[orm(skip)]
    pub scratch: String,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "newcrm_user_role", alias = "ur")]
pub struct UserRole {
    #[orm(base)]
    pub base: EntityBase,
    #[orm(required)]
    pub user_id: i32,
    #[orm(required)]
    pub role_id: i32,
}

#[derive(Debug, Default, Entity)]
#[orm(table = "newcrm_app_star", soft_delete = false)]
pub struct AppStar {
    #[orm(base)]
    pub base: EntityBase,
    #[orm(required)]
    pub user_id: i32,
    #[orm(required)]
    pub app_id: i32,
    #[orm(range = "0..=5")]
    pub start_num: f64,
}
