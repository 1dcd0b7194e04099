pub mod api;
pub mod blobs;
pub mod models;
pub mod resolver;
pub mod selector;
pub mod strategy;
pub mod url_kind;

pub use api::{BiliApi, LoginStatus};
pub use models::{MediaDescriptor, Page, QualityOption, StreamEntry, StreamUrls};
pub use resolver::PageResolver;
pub use selector::StreamSelector;
pub use strategy::{StreamInfoChain, StreamInfoStrategy};
pub use url_kind::{check_url, UrlKind};
