pub mod deck;
pub mod enrich;
pub mod etl;
pub mod extractor;
pub mod fetcher;
pub mod pipeline;

pub use crate::domain::model::{BirdRecord, DeckRow, TransformResult};
pub use crate::domain::ports::{Pipeline, Storage};
pub use crate::utils::error::Result;
