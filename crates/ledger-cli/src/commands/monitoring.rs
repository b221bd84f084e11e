//! Monitoring session commands.

use super::{parse_object, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use ledger_session::UserRecord;

/// Store a monitoring token issued by the admin login.
pub fn monitoring_set(
    ctx: &Context,
    token: &str,
    user: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    if token.trim().is_empty() {
        anyhow::bail!("Monitoring token is required");
    }
    let user = match user {
        Some(raw) => UserRecord::from_value(parse_object(raw)?).unwrap_or_default(),
        None => UserRecord::default(),
    };

    ctx.session.set_monitoring_auth(token.trim(), user)?;
    output::print_success("Monitoring session stored", format);
    Ok(())
}

pub fn monitoring_clear(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.session.clear_monitoring_auth()?;
    output::print_success("Monitoring session cleared", format);
    Ok(())
}
