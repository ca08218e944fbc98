use shop_service::ApiDoc;
use utoipa::OpenApi;

#[test]
fn openapi_document_lists_all_routes() {
    let doc = ApiDoc::openapi();
    let paths: Vec<&str> = doc.paths.paths.keys().map(|k| k.as_str()).collect();

    for expected in [
        "/auth/register",
        "/auth/login",
        "/categories",
        "/categories/{id}",
        "/products",
        "/products/{id}",
        "/cart/{user_id}",
        "/cart/{user_id}/items",
        "/cart/{user_id}/items/{item_id}",
        "/orders",
        "/orders/{id}",
        "/payments/webhook",
    ] {
        assert!(paths.contains(&expected), "missing path {expected}");
    }
}

#[test]
fn openapi_document_serializes() {
    let json = ApiDoc::openapi().to_pretty_json().unwrap();
    assert!(json.contains("\"/payments/webhook\""));
}
