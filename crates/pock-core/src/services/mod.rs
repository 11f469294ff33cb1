//! Operations that span the paged window, the remote collection and storage.

mod library;

pub use library::{delete_book, delete_book_record};
