use std::path::PathBuf;

/// Options shared by every action, resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_url: String,
    pub allowed_domains: Vec<String>,
    pub token_file: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_url: String, allowed_domains: Vec<String>, token_file: PathBuf) -> Self {
        Self {
            api_url,
            allowed_domains,
            token_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            "https://backend.tld".to_string(),
            vec!["taqa.ma".to_string()],
            PathBuf::from(".sesame-token"),
        );
        assert_eq!(args.api_url, "https://backend.tld");
        assert_eq!(args.allowed_domains, vec!["taqa.ma".to_string()]);
        assert_eq!(args.token_file, PathBuf::from(".sesame-token"));
    }
}
