//! HTTP admin surface and WebSocket upgrade route

mod routes;

pub use routes::build_router;
