pub mod audio;
pub mod collection;
pub mod config;
pub mod database;
pub mod models;
pub mod note_manager;
pub mod templates;

pub use audio::PronunciationDownloader;
pub use collection::{Collection, NoteQuery};
pub use config::{Config, FieldOptions};
pub use database::SqliteCollection;
pub use models::*;
pub use note_manager::NoteManager;
