use std::time::Duration;

use url::Url;

use crate::arl::Arl;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,
    pub app_lang: String,

    pub user_agent: String,

    pub arl: Arl,

    /// Endpoint exchanging the ARL for a JWT.
    pub auth_url: Url,

    /// Pipe GraphQL endpoint.
    pub pipe_url: Url,

    /// Tokens are considered expired this long before their stated expiry.
    pub expiry_margin: Duration,

    /// Total time allowed for a single HTTP request.
    pub timeout: Duration,
}

impl Config {
    pub const AUTH_URL: &'static str = "https://auth.deezer.com/login/arl";
    pub const PIPE_URL: &'static str = "https://pipe.deezer.com/api";

    pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(30);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a configuration for the production Deezer endpoints.
    ///
    /// # Panics
    ///
    /// Panics if the built-in endpoint URLs are invalid.
    #[must_use]
    pub fn with_arl(arl: Arl) -> Self {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();
        let app_lang = "en".to_owned();

        let user_agent = Self::user_agent(&app_name, &app_version, &app_lang);
        trace!("user agent: {user_agent}");

        Self {
            app_name,
            app_version,
            app_lang,

            user_agent,

            arl,

            auth_url: Url::parse(Self::AUTH_URL).expect("invalid auth url"),
            pipe_url: Url::parse(Self::PIPE_URL).expect("invalid pipe url"),

            expiry_margin: Self::DEFAULT_EXPIRY_MARGIN,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Points the client at different endpoints, e.g. a mock server.
    #[must_use]
    pub fn with_endpoints(mut self, auth_url: Url, pipe_url: Url) -> Self {
        self.auth_url = auth_url;
        self.pipe_url = pipe_url;
        self
    }

    /// Builds a `User-Agent` served like Deezer on desktop.
    ///
    /// Components that would break the format are replaced by `0`.
    fn user_agent(app_name: &str, app_version: &str, app_lang: &str) -> String {
        let illegal_chars = |chr: char| chr == '/' || chr == ';';
        let sanitize = |part: &str| {
            if part.is_empty() || part.contains(illegal_chars) {
                String::from("0")
            } else {
                part.to_owned()
            }
        };

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version().unwrap_or_default();

        format!(
            "{}/{} (Rust; {}/{}; Desktop; {})",
            sanitize(app_name),
            sanitize(app_version),
            sanitize(os_name),
            sanitize(&os_version),
            sanitize(app_lang),
        )
    }
}
