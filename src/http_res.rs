//! Just a few helper macros for Http Responses

/**
 * Returns a httpResponse with the right error message attached
 *
 * Use it like this:
 * ```text
 *  Unauthorized!("Hey this is the message")
 * ```
 *
 * Possible are:
 * - Unauthorized
 * - NotFound
 * - Conflict
 * - Forbidden
 * - BadRequest
 * - InternalServer
 */
#[macro_use]
pub mod res {
    #[macro_export]
    macro_rules! Unauthorized {
        ($message:expr) => {
            actix_web::HttpResponse::Unauthorized()
                .json(serde_json::json!({"error": format!("{}", $message)}))
        };
    }
    #[macro_export]
    macro_rules! NotFound {
        ($message:expr) => {
            actix_web::HttpResponse::NotFound()
                .json(serde_json::json!({"error": format!("{}", $message)}))
        };
    }
    #[macro_export]
    macro_rules! Conflict {
        ($message:expr) => {
            actix_web::HttpResponse::Conflict()
                .json(serde_json::json!({"error": format!("{}", $message)}))
        };
    }
    #[macro_export]
    macro_rules! Forbidden {
        ($message:expr) => {
            actix_web::HttpResponse::Forbidden()
                .json(serde_json::json!({"error": format!("{}", $message)}))
        };
    }
    #[macro_export]
    macro_rules! BadRequest {
        ($message:expr) => {
            actix_web::HttpResponse::BadRequest()
                .json(serde_json::json!({"error": format!("{}", $message)}))
        };
    }
    #[macro_export]
    macro_rules! InternalServer {
        ($message:expr) => {
            actix_web::HttpResponse::InternalServerError()
                .json(serde_json::json!({"error": format!("{}", $message)}))
        };
    }
}
