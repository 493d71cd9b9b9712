//! `tldw-agent config`: Configuration management commands.

use tldw_agent_config::AppConfig;

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    // `load` already rejects hard errors; what remains are warnings
    match AppConfig::load() {
        Ok(config) => {
            println!("   ok  Config parsed and validated");

            let mut warnings = Vec::new();
            if config.server.api_key.is_none() {
                warnings.push("No API key set (set TLDW_API_KEY or server.api_key)");
            }
            if config.agent.auto_approve_exec {
                warnings.push("auto_approve_exec = true: commands run without asking");
            }
            if config.server.base_url.starts_with("http://")
                && !is_loopback(&config.server.base_url)
            {
                warnings.push("server.base_url is plain http to a non-local host");
            }

            if warnings.is_empty() {
                println!("   ok  All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   !!  {w}");
                }
            }

            println!();
            println!("   Server:     {}", config.server.base_url);
            println!("   Tools:      {}", config.tools_endpoint());
            println!("   Model:      {}", config.agent.model);
            println!("   Max steps:  {}", config.agent.max_steps);
        }
        Err(e) => {
            println!("   error  {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", render_redacted(config)?);
    Ok(())
}

pub fn path() {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
}

fn render_redacted(mut config: AppConfig) -> Result<String, toml::ser::Error> {
    if config.server.api_key.is_some() {
        config.server.api_key = Some("********".into());
    }
    toml::to_string_pretty(&config)
}

fn is_loopback(url: &str) -> bool {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split('/').next().unwrap_or_default();
    authority.starts_with("[::1]")
        || matches!(authority.split(':').next(), Some("localhost" | "127.0.0.1"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn show_redacts_api_key() {
        let mut config = AppConfig::default();
        config.server.api_key = Some("sk-secret".into());
        let rendered = render_redacted(config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("********"));
        assert!(rendered.contains("[agent]"));
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("http://127.0.0.1:8000/api/v1"));
        assert!(is_loopback("http://localhost/api"));
        assert!(is_loopback("http://[::1]:8000/api"));
        assert!(!is_loopback("http://tldw.example.com/api/v1"));
    }
}
