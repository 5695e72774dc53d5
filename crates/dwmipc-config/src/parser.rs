//! KDL configuration parser

use std::io::ErrorKind;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::*;

/// Location of the configuration file when none is given
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/dwmipc/config.kdl";

/// Parse a configuration file from the given path
///
/// A missing file is not an error: the defaults are returned.
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => return Err(e.into()),
    };
    parse_config_str(&content)
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries its own miette version, so rebuild the span from offset/len
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "socket" => {
                let path = string_arg(node)?;
                if path.is_empty() {
                    return Err(invalid("socket path must not be empty"));
                }
                config.socket_path = Some(shellexpand::tilde(path).into_owned().into());
            }
            "max-payload-size" => {
                let size = int_arg(node)?;
                config.max_payload_size = u32::try_from(size)
                    .ok()
                    .filter(|size| *size > 0)
                    .ok_or_else(|| {
                        invalid(format!(
                            "max-payload-size must be between 1 and {}, got {}",
                            u32::MAX,
                            size
                        ))
                    })?;
            }
            "log-level" => {
                config.log_level = string_arg(node)?.parse().map_err(invalid)?;
            }
            "reconnect" => {
                config.reconnect = parse_reconnect(node)?;
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_reconnect(node: &kdl::KdlNode) -> Result<ReconnectConfig, ConfigError> {
    let mut reconnect = ReconnectConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "max-retries" => {
                    let retries = int_arg(child)?;
                    reconnect.max_retries = u32::try_from(retries).map_err(|_| {
                        invalid(format!("max-retries must not be negative, got {}", retries))
                    })?;
                }
                "initial-delay-ms" => {
                    let delay = int_arg(child)?;
                    reconnect.initial_delay_ms = u64::try_from(delay).map_err(|_| {
                        invalid(format!(
                            "initial-delay-ms must not be negative, got {}",
                            delay
                        ))
                    })?;
                }
                name => {
                    tracing::warn!("Unknown reconnect option: {}", name);
                }
            }
        }
    }

    Ok(reconnect)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

/// First argument of `node` as a string
fn string_arg(node: &kdl::KdlNode) -> Result<&str, ConfigError> {
    let name = node.name().value();
    node.entries()
        .first()
        .and_then(|entry| entry.value().as_string())
        .ok_or_else(|| invalid(format!("{} expects a string argument", name)))
}

/// First argument of `node` as an integer
fn int_arg(node: &kdl::KdlNode) -> Result<i64, ConfigError> {
    let name = node.name().value();
    node.entries()
        .first()
        .and_then(|entry| entry.value().as_i64())
        .ok_or_else(|| invalid(format!("{} expects an integer argument", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let config = r#"
            socket "/run/user/1000/dwm.sock"
            max-payload-size 65536
            log-level "debug"
            reconnect {
                max-retries 10
                initial-delay-ms 250
            }
        "#;

        let config = parse_config_str(config).unwrap();

        assert_eq!(
            config.socket_path,
            Some(PathBuf::from("/run/user/1000/dwm.sock"))
        );
        assert_eq!(config.max_payload_size, 65536);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.reconnect,
            ReconnectConfig {
                max_retries: 10,
                initial_delay_ms: 250
            }
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(config.reconnect.max_retries, 5);
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_partial_reconnect_block_keeps_other_defaults() {
        let config = parse_config_str("reconnect { max-retries 0; }").unwrap();

        assert_eq!(config.reconnect.max_retries, 0);
        assert_eq!(config.reconnect.initial_delay_ms, 500);
    }

    #[test]
    fn test_socket_path_tilde_expanded() {
        let config = parse_config_str(r#"socket "~/dwm.sock""#).unwrap();

        let path = config.socket_path.unwrap();
        assert!(!path.starts_with("~"), "path not expanded: {:?}", path);
        assert!(path.ends_with("dwm.sock"));
    }

    #[test]
    fn test_unknown_nodes_are_ignored() {
        let config = r#"
            colour "blue"
            reconnect {
                jitter 5
            }
        "#;

        assert_eq!(parse_config_str(config).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_log_level() {
        let result = parse_config_str(r#"log-level "loud""#);

        match result {
            Err(ConfigError::Invalid { message }) => {
                assert!(message.contains("loud"), "Message: {}", message)
            }
            other => panic!("Expected Invalid error, got: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_values_rejected() {
        for config in [
            "max-payload-size 0",
            "max-payload-size -1",
            r#"max-payload-size "large""#,
            "max-payload-size 4294967296",
            "socket 12",
            r#"socket """#,
            "reconnect { max-retries -2; }",
            r#"reconnect { initial-delay-ms "soon"; }"#,
        ] {
            assert!(
                matches!(parse_config_str(config), Err(ConfigError::Invalid { .. })),
                "Expected Invalid for: {}",
                config
            );
        }
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let result = parse_config_str("reconnect {");

        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_parse_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"log-level "error""#).unwrap();

        let config = parse_config(file.path()).unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let config = parse_config(&dir.path().join("config.kdl")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(parse_config(dir.path()), Err(ConfigError::Io(_))));
    }
}
