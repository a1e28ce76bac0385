use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
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

    Command::new("sesame")
        .about("Email one-time-code authentication client")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("api-url")
                .short('u')
                .long("api-url")
                .help("Backend base URL, example: https://maintenance.taqa.ma")
                .env("SESAME_API_URL")
                .required(true),
        )
        .arg(
            Arg::new("allowed-domain")
                .long("allowed-domain")
                .help("Email domain accepted at the login prompt (repeatable)")
                .env("SESAME_ALLOWED_DOMAIN")
                .default_value("taqa.ma")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("token-file")
                .long("token-file")
                .help("Where the session credential is stored between runs")
                .env("SESAME_TOKEN_FILE")
                .default_value(".sesame-token"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SESAME_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .subcommand(Command::new("login").about("Request a verification code and sign in"))
        .subcommand(Command::new("status").about("Check whether the stored session is still valid"))
        .subcommand(Command::new("logout").about("Invalidate the stored session"))
}
