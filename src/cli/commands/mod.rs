use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("linkgate")
        .about("Session and email-verification authority")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("LINKGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("dsn")
                .short('d')
                .long("dsn")
                .help("Postgres connection string; an in-memory store is used when absent")
                .env("LINKGATE_DSN"),
        )
        .arg(
            Arg::new("access-token-secret")
                .long("access-token-secret")
                .help("HMAC secret for access tokens")
                .env("LINKGATE_ACCESS_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("refresh-token-secret")
                .long("refresh-token-secret")
                .help("HMAC secret for refresh tokens, must differ from the access secret")
                .env("LINKGATE_REFRESH_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("access-token-ttl-seconds")
                .long("access-token-ttl-seconds")
                .help("Access token lifetime in seconds")
                .default_value("120")
                .env("LINKGATE_ACCESS_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("refresh-token-ttl-seconds")
                .long("refresh-token-ttl-seconds")
                .help("Refresh token and cookie lifetime in seconds")
                .default_value("86400")
                .env("LINKGATE_REFRESH_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("action-token-ttl-seconds")
                .long("action-token-ttl-seconds")
                .help("Verification link lifetime in seconds")
                .default_value("900")
                .env("LINKGATE_ACTION_TOKEN_TTL_SECONDS")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new("public-base-url")
                .long("public-base-url")
                .help("Base URL used to build verification links")
                .default_value("http://localhost:8080")
                .env("LINKGATE_PUBLIC_BASE_URL"),
        )
        .arg(
            Arg::new("cookie-secure")
                .long("cookie-secure")
                .help("Mark the refresh cookie Secure (requires HTTPS)")
                .env("LINKGATE_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("LINKGATE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
