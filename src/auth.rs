//! Acquisition and caching of Pipe API session tokens.
//!
//! The [`TokenManager`] exchanges the long-lived [`Arl`] for a short-lived
//! JWT, caches it in memory and hands it out until it is about to expire.
//!
//! # Token Lifecycle
//!
//! * No token is held until the first call to [`TokenManager::get_token`]
//! * Tokens are treated as expired [`Config::expiry_margin`] before their
//!   stated expiry, so they cannot lapse while a request is in flight
//! * [`TokenManager::invalidate`] forgets the token after the Pipe API
//!   rejected it
//! * Nothing is persisted; a new process starts without a token
//!
//! # Single-Flight Acquisition
//!
//! Concurrent callers that find no usable token do not each start an
//! exchange. The first caller installs a shared exchange future in the
//! cache slot; everyone else awaits a clone of that same future and receives
//! the same token or the same error.
//!
//! Abandoning a call (for example through `tokio::time::timeout`) does not
//! cancel the exchange for other waiters. If every waiter goes away, the
//! exchange is dropped and the next caller starts a new one.
//!
//! After the Pipe API rejects a token, [`TokenManager::invalidate_token`]
//! discards only that token. Requests rejected concurrently therefore share
//! one replacement exchange.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, SystemTime},
};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE};
use url::Url;

use crate::{
    arl::Arl,
    config::Config,
    error::{Error, Result},
    http::Client as HttpClient,
    protocol::{self, auth::Jwt},
    token::{self, SessionToken},
};

/// An exchange that can be awaited by any number of callers.
type PendingExchange = Shared<BoxFuture<'static, Result<SessionToken>>>;

/// Contents of the token cache.
enum Slot {
    Empty,
    Pending { id: u64, exchange: PendingExchange },
    Ready(SessionToken),
}

/// Produces currently valid session tokens on demand.
pub struct TokenManager {
    arl: Arl,
    auth_url: Url,
    expiry_margin: Duration,
    http_client: Arc<HttpClient>,
    slot: Mutex<Slot>,
    exchanges: AtomicU64,
}

/// A caller awaiting a pending exchange.
///
/// When the last waiter goes away before the exchange completes, the
/// exchange is dropped from the slot so that the next caller starts afresh
/// instead of resuming a request that may have outlived its timeout.
struct Waiter<'a> {
    manager: &'a TokenManager,
    id: u64,
    exchange: PendingExchange,
    settled: bool,
}

impl Waiter<'_> {
    async fn wait(mut self) -> Result<SessionToken> {
        let result = (&mut self.exchange).await;
        self.settled = true;

        // Whoever gets here first settles the slot. Leave it alone if it was
        // invalidated or replaced while the exchange was in flight.
        let mut slot = self.manager.lock();
        if matches!(&*slot, Slot::Pending { id, .. } if *id == self.id) {
            *slot = match &result {
                Ok(token) => Slot::Ready(token.clone()),
                Err(_) => Slot::Empty,
            };
        }

        result
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        // The slot holds one handle and this waiter the other.
        let mut slot = self.manager.lock();
        if let Slot::Pending { id, exchange } = &*slot {
            if *id == self.id && exchange.strong_count() == Some(2) {
                debug!("token exchange abandoned by all callers");
                *slot = Slot::Empty;
            }
        }
    }
}

impl TokenManager {
    /// Lifetime assumed when neither the response nor the JWT states one.
    ///
    /// Deezer currently issues tokens valid for six minutes.
    pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_secs(6 * 60);

    /// Creates a manager without a token.
    #[must_use]
    pub fn new(config: &Config, http_client: Arc<HttpClient>) -> Self {
        Self {
            arl: config.arl.clone(),
            auth_url: config.auth_url.clone(),
            expiry_margin: config.expiry_margin,
            http_client,
            slot: Mutex::new(Slot::Empty),
            exchanges: AtomicU64::new(0),
        }
    }

    /// Returns a token that stays valid for at least the expiry margin.
    ///
    /// Uses the cached token if there is one; otherwise joins the exchange
    /// in flight or starts a new one. A token that arrives within the expiry
    /// margin is exchanged once more; if the replacement is no better it is
    /// returned as long as it has not expired.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the exchange fails: the request
    /// could not be sent, the response was malformed, or the ARL was
    /// rejected.
    pub async fn get_token(&self) -> Result<SessionToken> {
        let token = self.acquire().await?;
        if !token.is_stale(self.expiry_margin) {
            return Ok(token);
        }

        debug!(
            "session token expires in {} seconds; exchanging again",
            token.time_to_live().as_secs()
        );
        self.invalidate_token(&token);

        let token = self.acquire().await?;
        if token.is_expired() {
            return Err(Error::authentication(
                &self.auth_url,
                None,
                "received an expired session token",
            ));
        }

        Ok(token)
    }

    /// Returns the cached token unless stale, or waits for an exchange.
    async fn acquire(&self) -> Result<SessionToken> {
        let waiter = {
            let mut slot = self.lock();
            match &*slot {
                Slot::Ready(token) if !token.is_stale(self.expiry_margin) => {
                    return Ok(token.clone());
                }
                Slot::Pending { id, exchange } => Waiter {
                    manager: self,
                    id: *id,
                    exchange: exchange.clone(),
                    settled: false,
                },
                Slot::Ready(_) | Slot::Empty => {
                    let id = self.exchanges.fetch_add(1, Ordering::Relaxed);
                    let exchange = self.exchange();
                    *slot = Slot::Pending {
                        id,
                        exchange: exchange.clone(),
                    };
                    Waiter {
                        manager: self,
                        id,
                        exchange,
                        settled: false,
                    }
                }
            }
        };

        waiter.wait().await
    }

    /// Discards the cached token, forcing the next call to
    /// [`get_token`](Self::get_token) to exchange the ARL again.
    ///
    /// An exchange in flight is forgotten as well: callers already waiting
    /// on it still get its result, but it will not be cached.
    pub fn invalidate(&self) {
        let mut slot = self.lock();
        if !matches!(*slot, Slot::Empty) {
            debug!("invalidating session token");
        }
        *slot = Slot::Empty;
    }

    /// Discards `token` if it is still the cached one.
    ///
    /// Used after the Pipe API rejected `token`. A newer token or an
    /// exchange in flight is kept, so that concurrent rejections of the same
    /// token lead to a single exchange.
    pub fn invalidate_token(&self, token: &SessionToken) {
        let mut slot = self.lock();
        if matches!(&*slot, Slot::Ready(current) if current == token) {
            debug!("invalidating session token");
            *slot = Slot::Empty;
        }
    }

    /// The cached token, if one is ready. Does not check expiry.
    #[must_use]
    pub fn cached(&self) -> Option<SessionToken> {
        match &*self.lock() {
            Slot::Ready(token) => Some(token.clone()),
            Slot::Pending { .. } | Slot::Empty => None,
        }
    }

    /// Critical sections never panic, so a poisoned lock still holds a
    /// consistent slot.
    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a shareable exchange that owns everything it needs.
    fn exchange(&self) -> PendingExchange {
        let http_client = Arc::clone(&self.http_client);
        let auth_url = self.auth_url.clone();
        let arl = self.arl.clone();

        async move { Self::exchange_arl(&http_client, auth_url, &arl).await }
            .boxed()
            .shared()
    }

    /// Exchanges the ARL for a JWT in a single request.
    async fn exchange_arl(
        http_client: &HttpClient,
        auth_url: Url,
        arl: &Arl,
    ) -> Result<SessionToken> {
        debug!("exchanging arl for session token");

        let mut cookie = HeaderValue::from_str(&format!("arl={}", arl.as_str()))
            .map_err(|e| Error::config(format!("arl cannot be sent as cookie: {e}")))?;
        cookie.set_sensitive(true);

        let mut request = http_client.post(auth_url.clone(), "");
        let headers = request.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain;charset=UTF-8"),
        );
        headers.insert(COOKIE, cookie);

        let rejected = |status, message: String| Error::authentication(&auth_url, status, message);

        let response = http_client
            .execute(request)
            .await
            .map_err(|e| rejected(e.status(), format!("token exchange failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| rejected(Some(status.as_u16()), format!("reading response failed: {e}")))?;

        if !status.is_success() {
            return Err(rejected(
                Some(status.as_u16()),
                format!("arl rejected: {}", excerpt(&body)),
            ));
        }

        let response = protocol::json::<Jwt>(&body, "login/arl")
            .map_err(|e| rejected(Some(status.as_u16()), format!("malformed response: {e}")))?;

        let jwt = response.jwt.as_deref().unwrap_or_default();
        let expires_at = match response.expires_in {
            Some(time_to_live) => SystemTime::now() + time_to_live,
            None => token::jwt_expiry(jwt)
                .unwrap_or_else(|| SystemTime::now() + Self::DEFAULT_TIME_TO_LIVE),
        };

        let token = SessionToken::new(jwt, expires_at).ok_or_else(|| {
            rejected(
                Some(status.as_u16()),
                String::from("no usable jwt received; please refresh your arl"),
            )
        })?;

        debug!(
            "session token time to live: {} seconds",
            token.time_to_live().as_secs()
        );

        Ok(token)
    }
}

/// Shortens a response body for inclusion in an error message.
pub(crate) fn excerpt(body: &str) -> &str {
    const MAX_LEN: usize = 200;

    let body = body.trim();
    match body.char_indices().nth(MAX_LEN) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}
