pub mod handlers;
pub mod links;
pub mod middleware;
pub mod routes;

pub use routes::create_router;
