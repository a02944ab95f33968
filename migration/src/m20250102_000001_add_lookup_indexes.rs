use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const INDEXES: &[(&str, &str, &str)] = &[
    ("idx_genre_movies_genre", "genre_movies", "genre_id"),
    ("idx_genre_movies_movie", "genre_movies", "movie_id"),
    ("idx_comments_user", "comments", "user_id"),
    ("idx_comments_movie", "comments", "movie_id"),
    ("idx_comments_created_at", "comments", "created_at"),
    ("idx_trailers_movie", "trailers", "movie_id"),
    ("idx_user_movies_user", "user_movies", "user_id"),
    ("idx_user_movies_movie", "user_movies", "movie_id"),
    ("idx_movies_title", "movies", "title"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, table, column) in INDEXES {
            manager
                .create_index(
                    Index::create()
                        .name(*name)
                        .table(Alias::new(*table))
                        .col(Alias::new(*column))
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, table, _) in INDEXES.iter().rev() {
            manager
                .drop_index(Index::drop().name(*name).table(Alias::new(*table)).to_owned())
                .await?;
        }

        Ok(())
    }
}
