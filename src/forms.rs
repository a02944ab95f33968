use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sea_orm::{DatabaseTransaction, RelationTrait, Set, entity::prelude::Date};
use serde::Deserialize;

use crate::{
    entities::{comment, genre, genre_movie, movie, trailer, user, user_movie},
    error::{AppError, AppResult},
    password::hash_password,
    repository::{AdminModel, Dependent, RelatedField, ensure_exists},
};

const MAX_CHARS: usize = 255;
const MAX_EMAIL_CHARS: usize = 254;
const MAX_URL_CHARS: usize = 200;
const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps"];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("email pattern compiles")
});

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserForm {
    pub username: Option<String>,
    pub email: Option<String>,
    /// Plaintext; hashed before it reaches the active model.
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MovieForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub release_date: Option<Date>,
    pub rating: Option<f64>,
    pub duration: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenreForm {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenreMovieForm {
    pub genre_id: Option<i32>,
    pub movie_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentForm {
    pub content: Option<String>,
    pub user_id: Option<i32>,
    pub movie_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrailerForm {
    pub url: Option<String>,
    pub movie_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserMovieForm {
    pub user_id: Option<i32>,
    pub movie_id: Option<i32>,
    pub rating: Option<f64>,
    pub watched_status: Option<bool>,
}

#[async_trait]
impl AdminModel for user::Entity {
    const NAME: &'static str = "user";
    const LABEL: &'static str = "username";
    const DEPENDENTS: &'static [Dependent] = &[
        Dependent { table: "user_movies", column: "user_id" },
        Dependent { table: "comments", column: "user_id" },
    ];

    type Form = UserForm;

    async fn apply(
        form: UserForm,
        model: &mut user::ActiveModel,
        _txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(username) = required(form.username, "username", creating)? {
            model.username = Set(char_field(username, "username", MAX_CHARS)?);
        }
        if let Some(email) = required(form.email, "email", creating)? {
            model.email = Set(email_field(email)?);
        }
        if let Some(password) = required(form.password, "password", creating)? {
            if password.is_empty() {
                return Err(blank("password"));
            }
            model.password = Set(hash_password(&password)?);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminModel for movie::Entity {
    const NAME: &'static str = "movie";
    const LABEL: &'static str = "title";
    const DEPENDENTS: &'static [Dependent] = &[
        Dependent { table: "comments", column: "movie_id" },
        Dependent { table: "trailers", column: "movie_id" },
        Dependent { table: "genre_movies", column: "movie_id" },
        Dependent { table: "user_movies", column: "movie_id" },
    ];

    type Form = MovieForm;

    async fn apply(
        form: MovieForm,
        model: &mut movie::ActiveModel,
        _txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(title) = required(form.title, "title", creating)? {
            model.title = Set(char_field(title, "title", MAX_CHARS)?);
        }
        if let Some(description) = required(form.description, "description", creating)? {
            model.description = Set(text_field(description, "description")?);
        }
        if let Some(release_date) = required(form.release_date, "release_date", creating)? {
            model.release_date = Set(release_date);
        }
        if let Some(rating) = required(form.rating, "rating", creating)? {
            model.rating = Set(float_field(rating, "rating")?);
        }
        if let Some(duration) = required(form.duration, "duration", creating)? {
            model.duration = Set(duration);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminModel for genre::Entity {
    const NAME: &'static str = "genre";
    const LABEL: &'static str = "name";
    const DEPENDENTS: &'static [Dependent] =
        &[Dependent { table: "genre_movies", column: "genre_id" }];

    type Form = GenreForm;

    async fn apply(
        form: GenreForm,
        model: &mut genre::ActiveModel,
        _txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(name) = required(form.name, "name", creating)? {
            model.name = Set(char_field(name, "name", MAX_CHARS)?);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminModel for genre_movie::Entity {
    const NAME: &'static str = "genre_movie";
    const LABEL: &'static str = "id";

    type Form = GenreMovieForm;

    fn related(name: &str) -> Option<RelatedField> {
        match name {
            "genre" => Some(RelatedField::to::<genre::Entity>(
                "genre_id",
                || genre_movie::Relation::Genre.def(),
            )),
            "movie" => Some(RelatedField::to::<movie::Entity>(
                "movie_id",
                || genre_movie::Relation::Movie.def(),
            )),
            _ => None,
        }
    }

    async fn apply(
        form: GenreMovieForm,
        model: &mut genre_movie::ActiveModel,
        txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(genre_id) = required(form.genre_id, "genre_id", creating)? {
            ensure_exists::<genre::Entity>(txn, genre_id, "genre_id").await?;
            model.genre_id = Set(genre_id);
        }
        if let Some(movie_id) = required(form.movie_id, "movie_id", creating)? {
            ensure_exists::<movie::Entity>(txn, movie_id, "movie_id").await?;
            model.movie_id = Set(movie_id);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminModel for comment::Entity {
    const NAME: &'static str = "comment";
    const LABEL: &'static str = "content";

    type Form = CommentForm;

    fn related(name: &str) -> Option<RelatedField> {
        match name {
            "user" => Some(RelatedField::to::<user::Entity>(
                "user_id",
                || comment::Relation::User.def(),
            )),
            "movie" => Some(RelatedField::to::<movie::Entity>(
                "movie_id",
                || comment::Relation::Movie.def(),
            )),
            _ => None,
        }
    }

    async fn apply(
        form: CommentForm,
        model: &mut comment::ActiveModel,
        txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(content) = required(form.content, "content", creating)? {
            model.content = Set(text_field(content, "content")?);
        }
        if let Some(user_id) = required(form.user_id, "user_id", creating)? {
            ensure_exists::<user::Entity>(txn, user_id, "user_id").await?;
            model.user_id = Set(user_id);
        }
        if let Some(movie_id) = required(form.movie_id, "movie_id", creating)? {
            ensure_exists::<movie::Entity>(txn, movie_id, "movie_id").await?;
            model.movie_id = Set(movie_id);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminModel for trailer::Entity {
    const NAME: &'static str = "trailer";
    const LABEL: &'static str = "url";

    type Form = TrailerForm;

    fn related(name: &str) -> Option<RelatedField> {
        match name {
            "movie" => Some(RelatedField::to::<movie::Entity>(
                "movie_id",
                || trailer::Relation::Movie.def(),
            )),
            _ => None,
        }
    }

    async fn apply(
        form: TrailerForm,
        model: &mut trailer::ActiveModel,
        txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(url) = required(form.url, "url", creating)? {
            model.url = Set(url_field(url)?);
        }
        if let Some(movie_id) = required(form.movie_id, "movie_id", creating)? {
            ensure_exists::<movie::Entity>(txn, movie_id, "movie_id").await?;
            model.movie_id = Set(movie_id);
        }
        Ok(())
    }
}

#[async_trait]
impl AdminModel for user_movie::Entity {
    const NAME: &'static str = "user_movie";
    const LABEL: &'static str = "id";

    type Form = UserMovieForm;

    fn related(name: &str) -> Option<RelatedField> {
        match name {
            "user" => Some(RelatedField::to::<user::Entity>(
                "user_id",
                || user_movie::Relation::User.def(),
            )),
            "movie" => Some(RelatedField::to::<movie::Entity>(
                "movie_id",
                || user_movie::Relation::Movie.def(),
            )),
            _ => None,
        }
    }

    async fn apply(
        form: UserMovieForm,
        model: &mut user_movie::ActiveModel,
        txn: &DatabaseTransaction,
        creating: bool,
    ) -> AppResult<()> {
        if let Some(user_id) = required(form.user_id, "user_id", creating)? {
            ensure_exists::<user::Entity>(txn, user_id, "user_id").await?;
            model.user_id = Set(user_id);
        }
        if let Some(movie_id) = required(form.movie_id, "movie_id", creating)? {
            ensure_exists::<movie::Entity>(txn, movie_id, "movie_id").await?;
            model.movie_id = Set(movie_id);
        }
        if let Some(rating) = required(form.rating, "rating", creating)? {
            model.rating = Set(float_field(rating, "rating")?);
        }
        if let Some(watched_status) = required(form.watched_status, "watched_status", creating)? {
            model.watched_status = Set(watched_status);
        }
        Ok(())
    }
}

fn required<T>(value: Option<T>, field: &str, creating: bool) -> AppResult<Option<T>> {
    match value {
        None if creating => Err(AppError::validation(format!("{field}: this field is required"))),
        value => Ok(value),
    }
}

fn blank(field: &str) -> AppError {
    AppError::validation(format!("{field}: this field may not be blank"))
}

fn char_field(value: String, field: &str, max: usize) -> AppResult<String> {
    let value = text_field(value, field)?;
    let len = value.chars().count();
    if len > max {
        return Err(AppError::validation(format!(
            "{field}: ensure this value has at most {max} characters (it has {len})"
        )));
    }
    Ok(value)
}

fn text_field(value: String, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(blank(field));
    }
    Ok(trimmed.to_string())
}

fn email_field(value: String) -> AppResult<String> {
    let value = char_field(value, "email", MAX_EMAIL_CHARS)?;
    if !EMAIL.is_match(&value) {
        return Err(AppError::validation("email: enter a valid email address"));
    }
    Ok(value)
}

fn url_field(value: String) -> AppResult<String> {
    let value = char_field(value, "url", MAX_URL_CHARS)?;
    let invalid = || AppError::validation("url: enter a valid URL");
    let parsed = url::Url::parse(&value).map_err(|_| invalid())?;
    if !URL_SCHEMES.contains(&parsed.scheme()) || parsed.host_str().is_none() {
        return Err(invalid());
    }
    Ok(value)
}

fn float_field(value: f64, field: &str) -> AppResult<f64> {
    if !value.is_finite() {
        return Err(AppError::validation(format!("{field}: enter a number")));
    }
    Ok(value)
}
