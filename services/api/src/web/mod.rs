pub mod auth;
pub mod middleware;
pub mod prayer_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the main WebSocket handler to make it easily accessible
// to the binary that will build the web server router.
pub use middleware::attach_user;
pub use rest::{
    create_review_handler, delete_devotion_handler, list_check_ins_handler,
    list_devotions_handler, save_check_in_handler, scripture_handler,
};
pub use ws_handler::ws_handler;
