use crate::auth::TokenConfig;
use crate::cli::actions::Action;
use anyhow::{anyhow, Context, Result};
use secrecy::SecretString;
use url::Url;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let access_secret = required_string(matches, "access-token-secret")?;
    let refresh_secret = required_string(matches, "refresh-token-secret")?;
    if access_secret == refresh_secret {
        return Err(anyhow!(
            "--access-token-secret and --refresh-token-secret must differ"
        ));
    }

    let tokens = TokenConfig::new(
        SecretString::from(access_secret),
        SecretString::from(refresh_secret),
    )
    .with_access_ttl_seconds(ttl(matches, "access-token-ttl-seconds", 120))
    .with_refresh_ttl_seconds(ttl(matches, "refresh-token-ttl-seconds", 86_400));

    let public_base_url = required_string(matches, "public-base-url")?;
    Url::parse(&public_base_url)
        .with_context(|| format!("Invalid public base URL: {public_base_url}"))?;

    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: matches.get_one::<String>("dsn").cloned(),
        tokens,
        action_token_ttl_seconds: ttl(matches, "action-token-ttl-seconds", 900),
        public_base_url,
        cookie_secure: matches.get_flag("cookie-secure"),
    })
}

fn required_string(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .ok_or_else(|| anyhow!("missing required argument: --{name}"))
}

fn ttl(matches: &clap::ArgMatches, name: &str, default: i64) -> i64 {
    matches.get_one::<i64>(name).copied().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    fn matches(extra: &[&str]) -> clap::ArgMatches {
        let mut args = vec![
            "linkgate",
            "--access-token-secret",
            "access-secret",
            "--refresh-token-secret",
            "refresh-secret",
        ];
        args.extend_from_slice(extra);
        commands::new().get_matches_from(args)
    }

    #[test]
    fn builds_server_action() -> Result<()> {
        temp_env::with_vars(
            [
                ("LINKGATE_DSN", None::<&str>),
                ("LINKGATE_COOKIE_SECURE", None),
                ("LINKGATE_PUBLIC_BASE_URL", None),
                ("LINKGATE_ACCESS_TOKEN_TTL_SECONDS", None),
                ("LINKGATE_REFRESH_TOKEN_TTL_SECONDS", None),
                ("LINKGATE_ACTION_TOKEN_TTL_SECONDS", None),
            ],
            || {
                let Action::Server {
                    port,
                    dsn,
                    tokens,
                    action_token_ttl_seconds,
                    public_base_url,
                    cookie_secure,
                } = handler(&matches(&["--port", "3000"]))?;

                assert_eq!(port, 3000);
                assert_eq!(dsn, None);
                assert_eq!(tokens.access_ttl_seconds(), 120);
                assert_eq!(tokens.refresh_ttl_seconds(), 86_400);
                assert_eq!(action_token_ttl_seconds, 900);
                assert_eq!(public_base_url, "http://localhost:8080");
                assert!(!cookie_secure);
                Ok(())
            },
        )
    }

    #[test]
    fn rejects_shared_secret() {
        let matches = commands::new().get_matches_from([
            "linkgate",
            "--access-token-secret",
            "same",
            "--refresh-token-secret",
            "same",
        ]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(handler(&matches(&["--public-base-url", "not a url"])).is_err());
    }
}
