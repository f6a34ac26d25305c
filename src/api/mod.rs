mod handlers;
mod routes;
mod state;

pub use handlers::{
    FeedbackRequest, RecommendationRequest, RecommendationResponse, SimilarQuery,
    SimilarTracksResponse,
};
pub use routes::create_router;
pub use state::AppState;
