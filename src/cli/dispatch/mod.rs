use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::Result;
use std::path::PathBuf;

pub fn handler(matches: &clap::ArgMatches) -> Result<(Action, GlobalArgs)> {
    let api_url = matches
        .get_one::<String>("api-url")
        .map(|s: &String| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --api-url"))?;

    let allowed_domains = matches
        .get_many::<String>("allowed-domain")
        .map(|values| values.map(|s| s.to_lowercase()).collect())
        .unwrap_or_default();

    let token_file = matches
        .get_one::<String>("token-file")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("missing required argument: --token-file"))?;

    let action = match matches.subcommand_name() {
        Some("status") => Action::Status,
        Some("logout") => Action::Logout,
        // `login` is also what running without a subcommand means.
        _ => Action::Login,
    };

    Ok((action, GlobalArgs::new(api_url, allowed_domains, token_file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn defaults_to_the_login_action() {
        let matches = commands::new().get_matches_from(vec![
            "sesame",
            "--api-url",
            "https://backend.tld",
        ]);
        let (action, globals) = handler(&matches).unwrap();
        assert!(matches!(action, Action::Login));
        assert_eq!(globals.api_url, "https://backend.tld");
        assert_eq!(globals.allowed_domains, vec!["taqa.ma".to_string()]);
        assert_eq!(globals.token_file, PathBuf::from(".sesame-token"));
    }

    #[test]
    fn maps_subcommands_to_actions() {
        for (name, expected) in [("status", Action::Status), ("logout", Action::Logout)] {
            let matches = commands::new().get_matches_from(vec![
                "sesame",
                "--api-url",
                "https://backend.tld",
                name,
            ]);
            let (action, _) = handler(&matches).unwrap();
            assert_eq!(action, expected);
        }
    }

    #[test]
    fn lower_cases_allowed_domains() {
        let matches = commands::new().get_matches_from(vec![
            "sesame",
            "--api-url",
            "https://backend.tld",
            "--allowed-domain",
            "TAQA.MA",
        ]);
        let (_, globals) = handler(&matches).unwrap();
        assert_eq!(globals.allowed_domains, vec!["taqa.ma".to_string()]);
    }
}
