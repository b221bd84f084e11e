//! Project Ledger CLI - Command-line shell for the client session subsystem.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Context;
use ledger_config::{init_logging, Config, Paths};
use ledger_session::{Method, SessionError};

/// Project Ledger CLI - Sign in, call the ledger API and check route access.
#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Project Ledger client for authentication and API access")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// API base URL; defaults to the config file
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with email and password
    Login {
        /// Email address (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Create an account
    Register {
        /// Email address (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
        /// Extra registration fields as key=value
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Logout and clear session
    Logout,

    /// Check authentication status
    Status,

    /// Fetch the signed-in user from the server
    Whoami,

    /// Send an authenticated API request
    Request {
        /// HTTP method
        #[arg(value_enum)]
        method: HttpMethod,
        /// API path, e.g. /api/v1/projects
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Evaluate the route guard for a path
    Route {
        /// Route path, e.g. /projects/3/edit
        path: String,
    },

    /// List known routes
    Routes,

    /// Manage the monitoring session
    Monitoring {
        #[command(subcommand)]
        command: MonitoringCommands,
    },

    /// Show or set the application title
    SystemName {
        /// New name; omitted to show the current one
        name: Option<String>,
    },

    /// Update the stored user profile
    Profile {
        /// JSON object merged into the user record
        #[arg(short, long)]
        data: Option<String>,
        /// Fields as key=value
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
enum MonitoringCommands {
    /// Store a monitoring token
    Set {
        /// Monitoring access token
        token: String,
        /// Monitoring user as a JSON object
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Clear the monitoring session
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::Get,
            HttpMethod::Post => Method::Post,
            HttpMethod::Put => Method::Put,
            HttpMethod::Patch => Method::Patch,
            HttpMethod::Delete => Method::Delete,
        }
    }
}

async fn run(cli: Cli, ctx: &Context) -> anyhow::Result<()> {
    let format = &cli.format;
    match cli.command {
        Commands::Login { email } => commands::login(ctx, email, format).await,
        Commands::Register { email, fields } => {
            commands::register(ctx, email, &fields, format).await
        }
        Commands::Logout => commands::logout(ctx, format),
        Commands::Status => commands::status(ctx, format),
        Commands::Whoami => commands::whoami(ctx, format).await,
        Commands::Request { method, path, data } => {
            commands::request(ctx, method.into(), &path, data.as_deref(), format).await
        }
        Commands::Route { path } => commands::route_check(ctx, &path, format),
        Commands::Routes => commands::routes_list(ctx, format),
        Commands::Monitoring { command } => match command {
            MonitoringCommands::Set { token, user } => {
                commands::monitoring_set(ctx, &token, user.as_deref(), format)
            }
            MonitoringCommands::Clear => commands::monitoring_clear(ctx, format),
        },
        Commands::SystemName { name } => commands::system_name(ctx, name.as_deref(), format),
        Commands::Profile { data, fields } => {
            commands::profile_update(ctx, data.as_deref(), &fields, format)
        }
    }
}

/// Message shown for a failed command.
fn error_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<SessionError>() {
        Some(session_error) => session_error.user_message(),
        None => format!("{:#}", e),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let paths = match Paths::new() {
        Ok(paths) => paths,
        Err(e) => {
            output::print_error(&e.to_string(), &format);
            std::process::exit(1);
        }
    };

    let mut config = match Config::load(&paths) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&e.to_string(), &format);
            std::process::exit(1);
        }
    };
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());

    // CLI doesn't need stderr output by default
    init_logging("ledger-cli", &level, Some(&paths), false);

    let result = match Context::open(&paths, &config).await {
        Ok(ctx) => run(cli, &ctx).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&error_message(&e), &format);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_request() {
        let cli = Cli::try_parse_from([
            "ledger",
            "--format",
            "json",
            "request",
            "post",
            "/api/v1/projects",
            "--data",
            r#"{"name":"Q2"}"#,
        ])
        .unwrap();

        match cli.command {
            Commands::Request { method, path, data } => {
                assert_eq!(Method::from(method), Method::Post);
                assert_eq!(path, "/api/v1/projects");
                assert_eq!(data.as_deref(), Some(r#"{"name":"Q2"}"#));
            }
            _ => panic!("expected request command"),
        }
    }

    #[test]
    fn test_cli_parses_monitoring_set() {
        let cli = Cli::try_parse_from(["ledger", "monitoring", "set", "M", "--user", "{}"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Monitoring {
                command: MonitoringCommands::Set { .. }
            }
        ));
    }

    #[test]
    fn test_error_message_prefers_user_message() {
        let e = anyhow::Error::from(SessionError::NotFound);
        assert_eq!(error_message(&e), "The requested resource does not exist");

        let e = anyhow::anyhow!("Email is required");
        assert_eq!(error_message(&e), "Email is required");
    }
}
