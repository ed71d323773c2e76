mod articles;
mod cache;
mod comments;
mod highlights;
mod schema;
mod types;

pub use schema::Database;
pub use types::{Article, ArticlePage, Comment, DatabaseError, Highlight, NewsItem};
