//! Authenticated API commands.

use super::{parse_fields, parse_object, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use ledger_session::{ApiRequest, Method};
use serde_json::Value;

/// Send one request through the authenticated pipeline.
pub async fn request(
    ctx: &Context,
    method: Method,
    path: &str,
    data: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let mut request = ApiRequest::new(method, path);
    if let Some(raw) = data {
        request = request.with_body(serde_json::from_str(raw)?);
    }

    let result = ctx.pipeline.send(request).await;
    if let Some(target) = ctx.navigator.take_redirect() {
        output::print_error(&format!("Redirected to {}", target), format);
    }

    let body = result?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

/// Merge fields into the stored user record.
pub fn profile_update(
    ctx: &Context,
    data: Option<&str>,
    fields: &[String],
    format: &OutputFormat,
) -> Result<()> {
    let mut partial = match data {
        Some(raw) => parse_object(raw)?,
        None => Value::Object(Default::default()),
    };
    if let Value::Object(map) = &mut partial {
        map.extend(parse_fields(fields)?);
    }

    ctx.session.update_user_info(&partial)?;
    output::print_success(
        &format!("Profile updated for {}", ctx.session.username()),
        format,
    );
    Ok(())
}

/// Show or change the application title.
pub fn system_name(ctx: &Context, name: Option<&str>, format: &OutputFormat) -> Result<()> {
    let Some(name) = name else {
        output::print_success(&ctx.session.system_name(), format);
        return Ok(());
    };

    if ctx.session.update_system_name(name)? {
        output::print_success(
            &format!("System name set to {}", ctx.session.system_name()),
            format,
        );
    } else {
        output::print_error("System name cannot be empty", format);
    }
    Ok(())
}
