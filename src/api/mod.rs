pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod speedtest;
pub mod static_files;

pub use handlers::AppState;
pub use routes::create_router;
