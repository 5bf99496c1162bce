use clap::Parser;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "blobby", about = "A server-rendered blogging application")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub sanitizer: SanitizerConfig,
    pub mail: MailConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Who gets the admin role. Evaluated once, at login time.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AdminPolicy {
    /// The earliest-registered account is the admin.
    FirstRegistered,
    /// No admin; only authorship grants edit/delete rights.
    Disabled,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub admin_policy: AdminPolicy,
    /// When true, only the admin may author new posts; editing and deleting
    /// stay owner-or-admin either way.
    pub admin_only_posting: bool,
}

/// Allow-list for user-authored rich text. Tags not listed are stripped
/// (inner text kept), attributes are filtered per tag with a `"*"` wildcard
/// key, and href/src values must use a listed scheme.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SanitizerConfig {
    pub allowed_tags: Vec<String>,
    pub allowed_attributes: HashMap<String, Vec<String>>,
    pub allowed_schemes: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MailConfig {
    /// Resend API key. The RESEND_API_KEY env var overrides this.
    pub api_key: Option<String>,
    pub sender: String,
    pub receiver: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "blobby_session".to_string(),
            session_hours: 720,
            admin_policy: AdminPolicy::FirstRegistered,
            admin_only_posting: false,
        }
    }
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        let mut allowed_attributes = HashMap::new();
        allowed_attributes.insert(
            "a".to_string(),
            vec!["href".to_string(), "title".to_string()],
        );
        allowed_attributes.insert("abbr".to_string(), vec!["title".to_string()]);
        allowed_attributes.insert("acronym".to_string(), vec!["title".to_string()]);

        Self {
            allowed_tags: [
                "a", "abbr", "acronym", "b", "blockquote", "br", "code", "em", "h1", "h2", "h3",
                "i", "li", "ol", "p", "strong", "ul",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            allowed_attributes,
            allowed_schemes: vec![
                "http".to_string(),
                "https".to_string(),
                "mailto".to_string(),
            ],
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            sender: "blobby@localhost".to_string(),
            receiver: "admin@localhost".to_string(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        // Secrets from the environment beat file values
        if let Ok(key) = std::env::var("RESEND_API_KEY") {
            if !key.is_empty() {
                config.mail.api_key = Some(key);
            }
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("blobby.db"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".blobby")
        })
    }

    pub fn db_path(&self) -> &PathBuf {
        self.database.path.as_ref().unwrap()
    }
}
