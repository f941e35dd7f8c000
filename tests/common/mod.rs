//! Common test utilities for devgate integration tests
//!
//! The binary under test is started as a child process; proxy tests pair it
//! with an in-process mock upstream.

#![allow(dead_code)] // Not every test file uses every helper
#![allow(unused_imports)]

pub mod assertions;
pub mod server;
pub mod site;
pub mod upstream;

pub use server::{client, free_port, TestServer};
pub use site::TestSite;
pub use upstream::MockUpstream;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_free_port_is_bindable() {
        let port = free_port();
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }

    #[test]
    fn test_site_builder_writes_files() {
        let site = TestSite::new()
            .file("index.html", "<h1>Home</h1>")
            .file("docs/guide.html", "guide");

        assert!(site.path().join("index.html").is_file());
        assert!(site.path().join("docs/guide.html").is_file());
    }
}
