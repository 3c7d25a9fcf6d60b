use std::env;

use checkout_payment_engine::gateways::EcPayConfig;
use cpg_common::{helpers::parse_boolean_flag, Secret};
use log::*;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    /// ECPay merchant credentials and endpoints
    pub ecpay: EcPayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            ecpay: ecpay_defaults(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env::var("CPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPG_PORT. {e} Using the default, {DEFAULT_CPG_PORT}, instead."
                    );
                    DEFAULT_CPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CPG_DATABASE_URL is not set. Please set it to the URL for the payment database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("CPG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("CPG_USE_FORWARDED").ok(), false);
        let ecpay = ecpay_config_from_env();
        Self { host, port, database_url, use_x_forwarded_for, use_forwarded, ecpay }
    }
}

/// The subset of the server configuration the request handlers need. Kept small and copyable so no secrets are
/// passed around the app data.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProxyConfig {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ProxyConfig {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

fn ecpay_defaults() -> EcPayConfig {
    EcPayConfig {
        merchant_id: String::default(),
        hash_key: Secret::default(),
        hash_iv: Secret::default(),
        base_url: None,
        notify_url: String::default(),
        return_url: None,
        sandbox: true,
    }
}

fn ecpay_config_from_env() -> EcPayConfig {
    let merchant_id = env::var("CPG_ECPAY_MERCHANT_ID").ok().unwrap_or_else(|| {
        error!("🪛️ CPG_ECPAY_MERCHANT_ID is not set. Please set it to your ECPay merchant id.");
        String::default()
    });
    let hash_key = env::var("CPG_ECPAY_HASH_KEY").map(Secret::new).ok().unwrap_or_else(|| {
        error!("🪛️ CPG_ECPAY_HASH_KEY is not set. Please set it to your ECPay hash key.");
        Secret::default()
    });
    let hash_iv = env::var("CPG_ECPAY_HASH_IV").map(Secret::new).ok().unwrap_or_else(|| {
        error!("🪛️ CPG_ECPAY_HASH_IV is not set. Please set it to your ECPay hash IV.");
        Secret::default()
    });
    let notify_url = env::var("CPG_ECPAY_NOTIFY_URL").ok().unwrap_or_else(|| {
        error!(
            "🪛️ CPG_ECPAY_NOTIFY_URL is not set. Please set it to the public URL ECPay must POST payment results \
             to, e.g. https://shop.example.com/callback/ecpay"
        );
        String::default()
    });
    let return_url = env::var("CPG_ECPAY_RETURN_URL").ok();
    let base_url = env::var("CPG_ECPAY_BASE_URL").ok();
    let sandbox = parse_boolean_flag(env::var("CPG_ECPAY_SANDBOX").ok(), true);
    if sandbox {
        warn!("🪛️ ECPay is running against the sandbox environment. Set CPG_ECPAY_SANDBOX=0 for production.");
    }
    EcPayConfig { merchant_id, hash_key, hash_iv, base_url, notify_url, return_url, sandbox }
}
