//! ping command - check server reachability

use super::CommandContext;
use anyhow::Result;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let service = ctx.service()?;
    let statuses = service.client().ping().await?;

    if ctx.is_json() {
        return ctx.print_json(&statuses);
    }

    for status in &statuses {
        let state = if status.available { "OK" } else { "UNAVAILABLE" };
        match &status.error {
            Some(error) => println!("{}:{}  {}  {}", status.host, status.port, state, error),
            None => println!("{}:{}  {}", status.host, status.port, state),
        }
    }

    let down = statuses.iter().filter(|s| !s.available).count();
    ctx.info(&format!(
        "\n{} of {} server(s) available",
        statuses.len() - down,
        statuses.len()
    ));

    if down == statuses.len() {
        anyhow::bail!("No LDAP server is reachable");
    }

    Ok(())
}
