//! Fixed identity provider and API endpoints used by the Lidl Plus app.

/// Headers the resource API expects from the official iOS client.
pub const APP_VERSION: &str = "999.99.9";
pub const OPERATING_SYSTEM: &str = "iOs";
pub const APP_ID: &str = "com.lidl.eci.lidl.plus";

/// Provider configuration for the Lidl Plus native client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    /// Authority hosting discovery, the login UI and the token endpoint.
    pub auth_api: String,
    pub ticket_api: String,
    pub coupons_api: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::lidl_plus()
    }
}

impl ProviderConfig {
    /// Endpoints and client registration of the production app.
    pub fn lidl_plus() -> Self {
        Self {
            client_id: "LidlPlusNativeClient".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "com.lidlplus.app://callback".to_string(),
            scope: "openid profile offline_access lpprofile lpapis".to_string(),
            auth_api: "https://accounts.lidl.com".to_string(),
            ticket_api: "https://tickets.lidlplus.com/api/v2".to_string(),
            coupons_api: "https://coupons.lidlplus.com/api".to_string(),
        }
    }

    /// Same client registration with every API rooted under `base`.
    ///
    /// Used to point the whole stack at a local mock server.
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            auth_api: base.to_string(),
            ticket_api: format!("{}/tickets/api/v2", base),
            coupons_api: format!("{}/coupons/api", base),
            ..Self::lidl_plus()
        }
    }

    fn auth_base(&self) -> &str {
        self.auth_api.trim_end_matches('/')
    }

    pub fn discovery_url(&self) -> String {
        format!("{}/.well-known/openid-configuration", self.auth_base())
    }

    pub fn token_url(&self) -> String {
        format!("{}/connect/token", self.auth_base())
    }

    /// Prefix shared by the authorize endpoint and its callback redirects.
    pub fn connect_prefix(&self) -> String {
        format!("{}/connect", self.auth_base())
    }

    pub fn account_login_prefix(&self) -> String {
        format!("{}/Account/Login", self.auth_base())
    }

    pub fn phone_exists_prefix(&self) -> String {
        format!("{}/api/phone/exists", self.auth_base())
    }
}
