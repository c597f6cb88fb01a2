pub mod post;
pub mod session;

pub use post::{CollectionPath, NewPost, Post, PostPatch, sort_newest_first};
pub use session::{AdminEmail, Identity, Session};
