pub mod admin;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod forms;
pub mod password;
pub mod repository;
pub mod routes;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{admin::AdminSite, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub site: Arc<AdminSite>,
}
