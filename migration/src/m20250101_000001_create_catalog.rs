use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len_uniq(Users::Username, 255))
                    .col(string_len_uniq(Users::Email, 254))
                    .col(string_len(Users::Password, 255))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .col(timestamp_with_time_zone(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(pk_auto(Movies::Id))
                    .col(string_len(Movies::Title, 255))
                    .col(text(Movies::Description))
                    .col(date(Movies::ReleaseDate))
                    .col(double(Movies::Rating))
                    .col(integer(Movies::Duration))
                    .col(timestamp_with_time_zone(Movies::CreatedAt))
                    .col(timestamp_with_time_zone(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Genres::Table)
                    .if_not_exists()
                    .col(pk_auto(Genres::Id))
                    .col(string_len(Genres::Name, 255))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GenreMovies::Table)
                    .if_not_exists()
                    .col(pk_auto(GenreMovies::Id))
                    .col(integer(GenreMovies::GenreId))
                    .col(integer(GenreMovies::MovieId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_genre_movies_genre")
                            .from(GenreMovies::Table, GenreMovies::GenreId)
                            .to(Genres::Table, Genres::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_genre_movies_movie")
                            .from(GenreMovies::Table, GenreMovies::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(pk_auto(Comments::Id))
                    .col(text(Comments::Content))
                    .col(timestamp_with_time_zone(Comments::CreatedAt))
                    .col(integer(Comments::UserId))
                    .col(integer(Comments::MovieId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_user")
                            .from(Comments::Table, Comments::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_movie")
                            .from(Comments::Table, Comments::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Trailers::Table)
                    .if_not_exists()
                    .col(pk_auto(Trailers::Id))
                    .col(string_len(Trailers::Url, 200))
                    .col(integer(Trailers::MovieId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trailers_movie")
                            .from(Trailers::Table, Trailers::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(UserMovies::Table)
                    .if_not_exists()
                    .col(pk_auto(UserMovies::Id))
                    .col(integer(UserMovies::UserId))
                    .col(integer(UserMovies::MovieId))
                    .col(double(UserMovies::Rating))
                    .col(boolean(UserMovies::WatchedStatus))
                    .col(timestamp_with_time_zone(UserMovies::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_movies_user")
                            .from(UserMovies::Table, UserMovies::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_movies_movie")
                            .from(UserMovies::Table, UserMovies::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(UserMovies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Trailers::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Comments::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(GenreMovies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Genres::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    Password,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    Description,
    ReleaseDate,
    Rating,
    Duration,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Genres {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum GenreMovies {
    Table,
    Id,
    GenreId,
    MovieId,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    Content,
    CreatedAt,
    UserId,
    MovieId,
}

#[derive(DeriveIden)]
enum Trailers {
    Table,
    Id,
    Url,
    MovieId,
}

#[derive(DeriveIden)]
enum UserMovies {
    Table,
    Id,
    UserId,
    MovieId,
    Rating,
    WatchedStatus,
    CreatedAt,
}
