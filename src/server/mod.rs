// src/server/mod.rs

//! Dev server collaborator: serves the output directory and tells
//! connected browsers to reload.

use std::net::SocketAddr;

pub mod http;

pub use http::{HttpDevServer, ServeOptions};

pub trait DevServer: Send + Sync {
    /// Ask every connected client to reload.
    fn reload(&self);

    /// Where the server listens, if it listens anywhere.
    fn address(&self) -> Option<SocketAddr> {
        None
    }
}
