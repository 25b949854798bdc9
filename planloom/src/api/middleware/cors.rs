//! CORS middleware configuration
//!
//! Configures Cross-Origin Resource Sharing (CORS) to allow requests from
//! localhost and development environments.

use tower_http::cors::CorsLayer;

/// Create CORS layer for development (allows localhost)
pub fn cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_creation() {
        let _cors = cors_layer();
    }
}
