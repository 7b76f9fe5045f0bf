//! Checkmk REST API client.
//!
//! The client is stateless: every call takes the [`Credentials`] of the
//! site it talks to, and all HTTP goes through a [`Transport`].
//!
//! - [`request`]: the basic request wrapper (auth, base URL, error folding).
//! - [`etag`]: reading and normalizing entity tags.
//! - [`conditional`]: `If-Match` mutations with a single retry on 412.
//! - [`pagination`]: walking `links.next` through a collection.

pub mod conditional;
pub mod config;
pub mod credentials;
pub mod error;
pub mod etag;
pub mod folder;
pub mod pagination;
pub mod request;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

pub use conditional::{MutationEvent, MutationOutcome, MutationState, tag_endpoint};
pub use config::{CheckmkConfig, TransportSettings};
pub use credentials::{CREDENTIAL_NAME, CredentialProvider, Credentials, StaticCredentials};
pub use error::{ClientError, Result};
pub use etag::{EntityTag, Tagged, normalize_etag};
pub use folder::{is_folder_id, normalize_folder_id};
pub use pagination::{next_link, page_items};
pub use request::{ApiResponse, CheckmkClient, RequestSpec};
pub use transport::{HeaderMap, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportFailure};

/// HTTP method type used in [`RequestSpec`].
pub use reqwest::Method;
