mod models;
mod routes;

const API_PREFIX: &str = "/api";

fn app() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest(API_PREFIX, routes::books::router())
}

/// Health check
/// - Tags: system
/// - Response: 200 text/plain Service is up
async fn health(call: &mut ApplicationCall) {
    call.respond_text(StatusCode::OK, "up").await;
}

fn main() {
    serve(app());
}
