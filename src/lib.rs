//! Minimal OpenID Connect sign-in gate—authorization-code exchange, silent token refresh, and
//! directory-backed claims enrichment behind one asynchronous login pipeline.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod acquire;
pub mod auth;
pub mod claims;
pub mod config;
pub mod directory;
pub mod enrich;
pub mod error;
pub mod flow;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		acquire::{ReqwestAcquirer, TokenAcquirer},
		auth::{TenantId, TokenSecret},
		config::{Authority, ClientCredential},
		http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper,
		store::{MemoryCache, TokenCache},
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Builds a validated [`Authority`] from a mock server base URL and tenant.
	pub fn test_authority(instance: &str, tenant: &str) -> Authority {
		let instance = Url::parse(instance).expect("Test instance URL should parse.");
		let tenant = TenantId::new(tenant).expect("Test tenant should be valid.");

		Authority::new(&instance, &tenant).expect("Test authority should build.")
	}

	/// Constructs a [`TokenAcquirer`] backed by an in-memory cache and the reqwest transport
	/// used across integration tests.
	pub fn build_reqwest_test_acquirer(
		authority: Authority,
		client_id: &str,
		client_secret: &str,
	) -> (ReqwestAcquirer, Arc<MemoryCache>) {
		let cache_backend = Arc::new(MemoryCache::default());
		let cache: Arc<dyn TokenCache> = cache_backend.clone();
		let credential = ClientCredential::new(client_id, TokenSecret::new(client_secret));
		let http_client = test_reqwest_http_client();
		let mapper = Arc::new(ReqwestTransportErrorMapper);
		let acquirer =
			TokenAcquirer::with_http_client(cache, authority, credential, http_client, mapper);

		(acquirer, cache_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{HashMap, hash_map::DefaultHasher},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use time;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
