//! Client-side Solid OIDC authentication: login negotiation, incoming
//! redirect handling, session persistence, and authenticated fetch.
//!
//! The core is a pair of handler chains. A [`login`] chain picks the login
//! strategy for the supplied options and sends the user to their identity
//! provider; an incoming-[`redirect`] chain interprets the URL the user
//! comes back on and turns it into session state. [`Session`] ties the two
//! together with persisted storage and an event channel.
//!
//! ```no_run
//! # async fn run() -> Result<(), solid_authn::Error> {
//! use solid_authn::{LoginOptions, Session, SessionConfig};
//! use std::sync::Arc;
//!
//! let session = Session::new(SessionConfig::with_client(reqwest::Client::new()));
//! session
//!     .login(LoginOptions {
//!         oidc_issuer: Some(url::Url::parse("https://login.example.com").unwrap()),
//!         redirect_url: Some(url::Url::parse("https://app.example.com/callback").unwrap()),
//!         client_id: Some("https://app.example.com/id".into()),
//!         handle_redirect: Some(Arc::new(|url| println!("visit {url}"))),
//!         ..Default::default()
//!     })
//!     .await?;
//! // ... the user authenticates and comes back ...
//! session
//!     .handle_incoming_redirect("https://app.example.com/callback?code=...&state=...")
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod fetch;
pub mod handler;
pub mod login;
pub mod logout;
pub mod redirect;
pub mod redirector;
pub mod refresh;
pub mod session;
pub mod session_info;
pub mod storage_utility;
pub mod util;

#[cfg(feature = "loopback")]
pub mod loopback;

pub use error::{Error, Result};
pub use events::SessionEvent;
pub use login::LoginOptions;
pub use session::{Session, SessionConfig};
pub use session_info::SessionInfo;
pub use storage_utility::{Scope, StorageUtility};

pub use solid_authn_common as common;
pub use solid_authn_oidc as oidc;
