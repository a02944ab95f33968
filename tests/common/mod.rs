#![allow(dead_code)]

use cineadmin::{
    admin::{AdminSite, SaveRequest},
    config::Config,
    db,
};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

pub async fn setup() -> (DatabaseConnection, AdminSite) {
    let config = Config::in_memory();
    let db = db::connect_and_migrate(&config.database_url).await.unwrap();
    let site = AdminSite::catalog(&config).unwrap();
    (db, site)
}

pub fn request(data: Value) -> SaveRequest {
    SaveRequest { data, ..Default::default() }
}

pub async fn add(db: &DatabaseConnection, site: &AdminSite, model: &str, data: Value) -> i32 {
    let view = site.create(db, model, request(data)).await.unwrap();
    view.object["id"].as_i64().unwrap() as i32
}

pub async fn add_user(db: &DatabaseConnection, site: &AdminSite, username: &str) -> i32 {
    add(
        db,
        site,
        "user",
        json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct horse",
        }),
    )
    .await
}

pub async fn add_movie(db: &DatabaseConnection, site: &AdminSite, title: &str) -> i32 {
    add(
        db,
        site,
        "movie",
        json!({
            "title": title,
            "description": format!("{title}, the film."),
            "release_date": "1979-05-25",
            "rating": 8.5,
            "duration": 117,
        }),
    )
    .await
}

pub async fn add_comment(
    db: &DatabaseConnection,
    site: &AdminSite,
    user: i32,
    movie: i32,
    content: &str,
) -> i32 {
    add(db, site, "comment", json!({ "user_id": user, "movie_id": movie, "content": content }))
        .await
}
