use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error("Invalid server address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("Invalid tool {name}: {message}")]
    InvalidTool { name: String, message: String },

    #[error("Configuration error: {0}")]
    Other(#[from] config::ConfigError),
}

/// Name of the environment variable that sets a settings field.
///
/// Bare field names belong to the provider section, which is the only one with
/// required fields.
pub fn to_env_var(field_path: &str) -> String {
    let normalized_path = if field_path.contains('.') {
        field_path.to_string()
    } else {
        format!("provider.{}", field_path)
    };
    format!("ANALYST_{}", normalized_path.replace('.', "__").to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_var() {
        assert_eq!(to_env_var("api_key"), "ANALYST_PROVIDER__API_KEY");
        assert_eq!(to_env_var("provider.api_key"), "ANALYST_PROVIDER__API_KEY");
        assert_eq!(to_env_var("server.port"), "ANALYST_SERVER__PORT");
    }
}
