//! HTTP serving glue.
//!
//! # Data Flow
//! ```text
//! Application (AppContext + Router)
//!     → server.rs (listen settings from live config, bind)
//!     → axum::serve with ConnectInfo<SocketAddr>
//!     → middleware chain → routes / __reload
//! ```

pub mod server;

pub use server::{HttpServer, ListenSettings};
