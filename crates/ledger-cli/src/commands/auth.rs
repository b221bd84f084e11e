//! Authentication commands.

use super::{parse_fields, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use ledger_session::Credentials;
use serde_json::Value;
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_credentials(email: Option<String>) -> Result<Credentials> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email")?,
    };
    if email.is_empty() {
        anyhow::bail!("Email is required");
    }

    // Read password without echo
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    Ok(Credentials::new(email, password))
}

/// Login with email and password.
pub async fn login(ctx: &Context, email: Option<String>, format: &OutputFormat) -> Result<()> {
    if ctx.session.is_authenticated() {
        output::print_success(
            &format!("Already logged in as {}", ctx.session.username()),
            format,
        );
        return Ok(());
    }

    let credentials = prompt_credentials(email)?;
    println!("Logging in...");

    let user = ctx.session.login(&credentials).await?;
    let mut message = format!("Logged in as {}", user.record().display_name());
    if user.is_fallback() {
        message.push_str(" (server returned no profile)");
    }
    output::print_success(&message, format);
    Ok(())
}

/// Create an account. Does not log in.
pub async fn register(
    ctx: &Context,
    email: Option<String>,
    fields: &[String],
    format: &OutputFormat,
) -> Result<()> {
    let credentials = prompt_credentials(email)?;
    let mut data = parse_fields(fields)?;
    data.insert("email".into(), Value::String(credentials.email.clone()));
    data.insert("password".into(), Value::String(credentials.password));

    let created = ctx.session.register(&Value::Object(data)).await?;
    output::print_value(
        &created,
        || format!("Registered {}. Run 'ledger login' to sign in.", credentials.email),
        format,
    );
    Ok(())
}

/// Logout and clear every stored trace of the session.
pub fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let report = ctx.session.logout();

    match format {
        OutputFormat::Text => {
            println!("Logged out");
            output::print_row("Keys removed", &report.durable_keys_removed.len().to_string());
            output::print_row("Cookies", &report.cookies_expired.to_string());
            output::print_row("Databases", &report.databases_removed.len().to_string());
            for failure in &report.failures {
                output::print_row(failure.surface, &failure.message);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

/// Show session status.
pub fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let snapshot = ctx.session.snapshot();

    output::print_value(
        &snapshot,
        || {
            let mut lines = vec![snapshot.app_title.clone()];
            if snapshot.is_authenticated {
                lines.push(format!("Auth:        logged in as {}", snapshot.username));
                lines.push(format!("User ID:     {}", snapshot.user_id));
                if !snapshot.tenant_id.is_empty() {
                    lines.push(format!("Tenant:      {}", snapshot.tenant_id));
                }
            } else {
                lines.push("Auth:        not logged in".to_string());
            }
            let monitoring = if snapshot.is_monitoring_authenticated {
                "logged in"
            } else {
                "not logged in"
            };
            lines.push(format!("Monitoring:  {}", monitoring));
            lines.join("\n")
        },
        format,
    );
    Ok(())
}

/// Fetch the current user from the server and print it.
pub async fn whoami(ctx: &Context, format: &OutputFormat) -> Result<()> {
    if !ctx.session.is_authenticated() {
        output::print_error("Not logged in", format);
        return Ok(());
    }

    let user = ctx.pipeline.current_user().await?;
    match format {
        OutputFormat::Text => {
            output::print_heading(&user.display_name());
            output::print_row("ID", &user.id().unwrap_or_default());
            output::print_row("Email", user.email().unwrap_or(""));
            output::print_row("Tenant", &user.tenant_id().unwrap_or_default());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
    }
    Ok(())
}
