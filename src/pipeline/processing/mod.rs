// Export processing: field normalization, statistics, enrichment and rendering

pub mod enrich;
mod entities;
pub mod normalize;
pub mod phone;
pub mod rich_text;
pub mod stats;
pub mod tabular;
