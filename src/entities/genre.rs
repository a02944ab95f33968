use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "genres")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::genre_movie::Entity")]
    GenreMovie,
}

impl Related<super::genre_movie::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GenreMovie.def()
    }
}

impl Related<super::movie::Entity> for Entity {
    fn to() -> RelationDef {
        super::genre_movie::Relation::Movie.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::genre_movie::Relation::Genre.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
