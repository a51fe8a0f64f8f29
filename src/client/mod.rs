mod blocking_client;
mod executor;

pub use blocking_client::{Client, ClientBuilder};
