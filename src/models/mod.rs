mod product;
mod recommendation;

pub use product::{
    is_valid_identifier, CatalogSnapshot, Product, SnapshotError, MAX_IDENTIFIER_LEN,
};
pub use recommendation::{
    GetRecommendations, RecommendationReply, RecommendationRequest, RecommendationResponse,
    ResponseStatus,
};
