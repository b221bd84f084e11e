//! Route guard commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use ledger_session::GuardDecision;

/// Evaluate navigation to `path` against the current session.
pub fn route_check(ctx: &Context, path: &str, format: &OutputFormat) -> Result<()> {
    let navigation = ctx.guard.before_each(path);

    output::print_value(
        &navigation,
        || match navigation.decision {
            GuardDecision::Allow if navigation.resolved != navigation.requested => {
                format!("allow {} (via {})", navigation.resolved, navigation.requested)
            }
            GuardDecision::Allow => format!("allow {}", navigation.resolved),
            GuardDecision::Redirect(to) => format!("redirect {} -> {}", navigation.requested, to),
        },
        format,
    );
    Ok(())
}

/// List the route table.
pub fn routes_list(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let routes = ctx.guard.routes().routes();

    match format {
        OutputFormat::Text => {
            output::print_heading("Routes");
            for route in routes {
                let access = match (route.redirect, route.meta) {
                    (Some(to), _) => format!("-> {}", to),
                    (None, meta) if meta.requires_auth => "auth".to_string(),
                    (None, meta) if meta.requires_monitoring_auth => "monitoring".to_string(),
                    (None, _) => "public".to_string(),
                };
                output::print_row(route.pattern, &access);
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = routes
                .iter()
                .map(|route| {
                    serde_json::json!({
                        "path": route.pattern,
                        "name": route.name,
                        "requires_auth": route.meta.requires_auth,
                        "requires_monitoring_auth": route.meta.requires_monitoring_auth,
                        "redirect": route.redirect,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
