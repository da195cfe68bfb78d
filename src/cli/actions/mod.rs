use crate::auth::TokenConfig;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: Option<String>,
        tokens: TokenConfig,
        action_token_ttl_seconds: i64,
        public_base_url: String,
        cookie_secure: bool,
    },
}
