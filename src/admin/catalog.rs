use super::{
    AdminSite,
    options::{Action, ActionKind, InlineAdmin, ListFilter, ModelAdmin},
};
use crate::{
    config::Config,
    entities::{comment, genre, genre_movie, movie, trailer, user, user_movie},
    error::AppResult,
    repository::Repository,
};

const USER_MOVIE_INLINE: InlineAdmin = InlineAdmin {
    model: "user_movie",
    fk: "user_id",
    fields: &["movie", "rating", "watched_status", "created_at"],
    readonly_fields: &["created_at"],
    extra: 0,
    can_delete: true,
    autocomplete_fields: &[],
};

const COMMENT_INLINE: InlineAdmin = InlineAdmin {
    model: "comment",
    fk: "movie_id",
    fields: &["user", "content", "created_at"],
    readonly_fields: &["created_at"],
    extra: 0,
    can_delete: true,
    autocomplete_fields: &[],
};

const GENRE_MOVIE_INLINE: InlineAdmin = InlineAdmin {
    model: "genre_movie",
    fk: "movie_id",
    fields: &["genre"],
    readonly_fields: &[],
    extra: 1,
    can_delete: true,
    autocomplete_fields: &["genre"],
};

pub static USER_ADMIN: ModelAdmin = ModelAdmin {
    name: "user",
    verbose_name: "user",
    verbose_name_plural: "users",
    list_display: &["id", "username", "email", "created_at"],
    search_fields: &["username", "email"],
    list_filter: &[],
    autocomplete_fields: &[],
    inlines: &[USER_MOVIE_INLINE],
    actions: &[],
};

pub static USER_MOVIE_ADMIN: ModelAdmin = ModelAdmin {
    name: "user_movie",
    verbose_name: "user movie",
    verbose_name_plural: "user movies",
    list_display: &["user", "movie", "rating", "watched_status", "created_at"],
    search_fields: &["user__username", "movie__title"],
    list_filter: &[
        ListFilter::Field { field: "rating" },
        ListFilter::Field { field: "created_at" },
        ListFilter::Field { field: "watched_status" },
    ],
    autocomplete_fields: &["user", "movie"],
    inlines: &[],
    actions: &[Action {
        name: "add_movie_to_favorites",
        description: "Add a Movie to a User's Favorites",
        kind: ActionKind::Notice("Feature to add movies manually will be added here."),
    }],
};

pub static MOVIE_ADMIN: ModelAdmin = ModelAdmin {
    name: "movie",
    verbose_name: "movie",
    verbose_name_plural: "movies",
    list_display: &["id", "title", "release_date", "rating", "duration"],
    search_fields: &["title"],
    list_filter: &[
        ListFilter::Field { field: "release_date" },
        ListFilter::Field { field: "rating" },
    ],
    autocomplete_fields: &[],
    inlines: &[COMMENT_INLINE, GENRE_MOVIE_INLINE],
    actions: &[],
};

pub static COMMENT_ADMIN: ModelAdmin = ModelAdmin {
    name: "comment",
    verbose_name: "comment",
    verbose_name_plural: "comments",
    list_display: &["id", "movie", "user", "content", "created_at"],
    search_fields: &["user__username", "movie__title", "content"],
    list_filter: &[
        ListFilter::Field { field: "created_at" },
        ListFilter::Related { title: "Movie", parameter: "movie", relation: "movie" },
    ],
    autocomplete_fields: &["movie", "user"],
    inlines: &[],
    actions: &[Action {
        name: "delete_selected",
        description: "Delete Selected Comments",
        kind: ActionKind::DeleteSelected { noun: "comment" },
    }],
};

pub static TRAILER_ADMIN: ModelAdmin = ModelAdmin {
    name: "trailer",
    verbose_name: "trailer",
    verbose_name_plural: "trailers",
    list_display: &["id", "movie", "url"],
    search_fields: &["movie__title"],
    list_filter: &[],
    autocomplete_fields: &["movie"],
    inlines: &[],
    actions: &[],
};

pub static GENRE_ADMIN: ModelAdmin = ModelAdmin {
    name: "genre",
    verbose_name: "genre",
    verbose_name_plural: "genres",
    list_display: &["id", "name"],
    search_fields: &["name"],
    list_filter: &[],
    autocomplete_fields: &[],
    inlines: &[],
    actions: &[],
};

pub static GENRE_MOVIE_ADMIN: ModelAdmin = ModelAdmin {
    name: "genre_movie",
    verbose_name: "genre movie",
    verbose_name_plural: "genre movies",
    list_display: &["genre", "movie"],
    search_fields: &[],
    list_filter: &[],
    autocomplete_fields: &["genre", "movie"],
    inlines: &[],
    actions: &[],
};

impl AdminSite {
    /// The movie catalog: every model with its admin configuration, checked
    /// for consistency.
    pub fn catalog(config: &Config) -> AppResult<Self> {
        let mut site = AdminSite::new(config.page_size, config.autocomplete_limit);
        site.register(&USER_ADMIN, Repository::<user::Entity>::boxed())
            .register(&USER_MOVIE_ADMIN, Repository::<user_movie::Entity>::boxed())
            .register(&MOVIE_ADMIN, Repository::<movie::Entity>::boxed())
            .register(&COMMENT_ADMIN, Repository::<comment::Entity>::boxed())
            .register(&TRAILER_ADMIN, Repository::<trailer::Entity>::boxed())
            .register(&GENRE_ADMIN, Repository::<genre::Entity>::boxed())
            .register(&GENRE_MOVIE_ADMIN, Repository::<genre_movie::Entity>::boxed());
        site.check()?;
        Ok(site)
    }
}
