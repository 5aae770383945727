//! check-config command - validate the LDAP server list

use super::CommandContext;
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct ServerSummary {
    host: String,
    port: u16,
    tls: &'static str,
    bind: &'static str,
    search_base_dns: Vec<String>,
    group_mappings: usize,
}

pub fn execute(ctx: &CommandContext) -> Result<()> {
    let config = ctx.load_config()?;

    let summaries: Vec<ServerSummary> = config
        .servers
        .iter()
        .map(|server| ServerSummary {
            host: server.host.clone(),
            port: server.port,
            tls: match (server.use_ssl, server.start_tls) {
                (false, _) => "none",
                (true, false) => "ldaps",
                (true, true) => "starttls",
            },
            bind: if !server.bind_password.is_empty() {
                "admin"
            } else if server.bind_dn.contains("%s") {
                "single"
            } else {
                "unauthenticated"
            },
            search_base_dns: server.search_base_dns.clone(),
            group_mappings: server.group_mappings.len(),
        })
        .collect();

    if ctx.is_json() {
        return ctx.print_json(&summaries);
    }

    ctx.info(&format!(
        "{}: {} server(s)\n",
        ctx.settings.config_file.display(),
        summaries.len()
    ));
    for summary in &summaries {
        println!(
            "{}:{}  tls={}  bind={}  mappings={}",
            summary.host, summary.port, summary.tls, summary.bind, summary.group_mappings
        );
        for base in &summary.search_base_dns {
            println!("  base: {}", base);
        }
    }

    Ok(())
}
