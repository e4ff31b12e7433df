use axum::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!( {
        "message": "API up!",
    }))
}

pub mod auth;
pub mod earnings;
pub mod event;
pub mod notifications;
pub mod plans;
pub mod requests;
pub mod user;
