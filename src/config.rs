use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "gemini", "remote", or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: u64,
}

/// How a generated statement is checked before its results are fetched.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Run the statement inside a savepoint that is rolled back, then run it again for results.
    TrialRun,
    /// Run the statement once; an engine error at execution is the validation signal.
    SinglePass,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::TrialRun => write!(f, "trial_run"),
            ValidationMode::SinglePass => write!(f, "single_pass"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub validation: ValidationMode,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub data_dir: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Directory for temporary database copies
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Language model backend (gemini, remote, ollama)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Model identifier passed to the backend
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// API key for the language model service
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Ask one question about a database file and print the result.
    Ask(AskArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Output format for `ask` results.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    /// SQLite database file to query
    #[arg(short, long, value_name = "FILE")]
    pub database: PathBuf,

    /// Question in natural language
    #[arg(short, long)]
    pub question: String,

    /// How to print the result set
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with default configuration
        let mut config_builder = Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 3000_i64)?
            .set_default("llm.backend", "gemini")?
            .set_default("llm.model", "gemini-1.5-flash")?
            .set_default("llm.timeout_secs", 60_i64)?
            .set_default("pipeline.validation", "trial_run")?
            .set_default("pipeline.max_upload_bytes", 64_i64 * 1024 * 1024)?
            .set_default("data_dir", std::env::temp_dir().to_string_lossy().to_string())?;

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-sqlite/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder.add_source(
            Environment::with_prefix("NL_SQLITE")
                .prefix_separator("_")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Command::Serve(serve) = &args.command {
            if let Some(host) = &serve.host {
                config.web.host = host.clone();
            }
            if let Some(port) = serve.port {
                config.web.port = port;
            }
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(backend) = &args.backend {
            config.llm.backend = backend.clone();
        }
        if let Some(model) = &args.model {
            config.llm.model = model.clone();
        }
        if let Some(api_key) = &args.api_key {
            config.llm.api_key = Some(api_key.clone());
        }

        Ok(config)
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "gemini".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_key: None,
                api_url: None,
                timeout_secs: 60,
            },
            pipeline: PipelineConfig {
                validation: ValidationMode::TrialRun,
                max_upload_bytes: 64 * 1024 * 1024,
            },
            data_dir: std::env::temp_dir().to_string_lossy().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args_with(config: Option<PathBuf>, command: Command) -> CliArgs {
        CliArgs {
            config,
            data_dir: None,
            backend: None,
            model: None,
            api_key: None,
            log_json: false,
            command,
        }
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[llm]\nbackend = \"ollama\"\nmodel = \"sqlcoder\"\n\n[pipeline]\nvalidation = \"single_pass\""
        )
        .unwrap();

        let args = args_with(
            Some(file.path().to_path_buf()),
            Command::Serve(ServeArgs { host: None, port: Some(8080) }),
        );
        let config = AppConfig::new(&args).unwrap();

        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "sqlcoder");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.pipeline.validation, ValidationMode::SinglePass);
        assert_eq!(config.web.host, "127.0.0.1");
        assert_eq!(config.web.port, 8080);
    }

    #[test]
    fn test_cli_flags_win() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[llm]\nmodel = \"from-file\"").unwrap();

        let mut args = args_with(
            Some(file.path().to_path_buf()),
            Command::Ask(AskArgs {
                database: PathBuf::from("orders.db"),
                question: "how many orders?".to_string(),
                format: OutputFormat::Csv,
            }),
        );
        args.model = Some("from-cli".to_string());
        args.api_key = Some("secret".to_string());

        let config = AppConfig::new(&args).unwrap();
        assert_eq!(config.llm.model, "from-cli");
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
        assert_eq!(config.pipeline.validation, ValidationMode::TrialRun);
    }
}
