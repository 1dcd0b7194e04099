//! HTTP plumbing shared by the resolver and the download engine

pub mod http;

pub use http::{FetchOptions, FetchResponse, HttpClient, ResponseBody};
