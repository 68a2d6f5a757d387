// Build-time identity of the agent

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `User-Agent` sent with outbound pushes, e.g. `sentinel/0.1.0`.
pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_is_name_slash_version() {
        let ua = user_agent();
        assert!(ua.starts_with(NAME));
        assert!(ua.ends_with(VERSION));
    }
}
