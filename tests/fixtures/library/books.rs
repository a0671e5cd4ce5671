use crate::models::{Book, NewBook};

const AUTHOR: &str = "author";

pub fn router() -> Router {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/:id", get(get_book).delete(delete_book))
        .route("/books/:id/cover", get(get_cover))
}

/// List books in the catalog
/// - Tags: books
/// - Query parameters:
///   - author [String]? Filter by author name
///     maxLength: 100
/// - Response: 200 [Book]+ The matching books
async fn list_books(call: &mut ApplicationCall) {
    let query = call.request().query_parameters();
    let author = query.get(AUTHOR);
    let page = query.get("page");
    call.respond(StatusCode::OK, Json(Vec::new())).await;
}

/// Add a book to the catalog
/// - Tags: books
/// - Body: [NewBook] The book to add
async fn create_book(call: &mut ApplicationCall) {
    let book: NewBook = call.receive().await?;
    call.respond(StatusCode::CREATED, Json(book)).await;
}

/// Fetch one book
/// - Tags: books
/// - Path parameters:
///   - id [u64] Book identifier
/// - Responses:
///   - 200 [Book] The book
///   - 404 No such book
async fn get_book(call: &mut ApplicationCall) {
    let id = call.parameters().get("id");
    let request_id = call.request().header("X-Request-Id");
    match find(id) {
        Some(book) => call.respond(book).await,
        None => call.respond(StatusCode::NOT_FOUND, "missing").await,
    }
}

async fn delete_book(call: &mut ApplicationCall) {
    let id = call.parameters()["id"];
    call.respond(StatusCode::NO_CONTENT).await;
}

/// Cover image of a book
/// - Deprecated
async fn get_cover(call: &mut ApplicationCall) {
    call.respond_bytes(cover_of(call.parameters().get("id"))).await;
}
