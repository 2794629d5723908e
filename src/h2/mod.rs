pub mod client;
pub mod connection;
pub mod consts;
pub mod framing;
pub mod hpack;
pub mod stream;
pub mod transport;

pub use client::H2;
pub use connection::H2Connection;
pub use transport::H2Transport;
