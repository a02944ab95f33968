pub mod comment;
pub mod genre;
pub mod genre_movie;
pub mod movie;
pub mod trailer;
pub mod user;
pub mod user_movie;
