//! login command - authenticate a user

use super::{print_user, CommandContext};
use anyhow::{Context, Result};

pub async fn execute(ctx: &CommandContext, username: &str, password: &str) -> Result<()> {
    let service = ctx.service()?;

    let user = service
        .login(username, password)
        .await
        .with_context(|| format!("Login failed for {}", username))?;

    if ctx.is_json() {
        return ctx.print_json(&user);
    }

    ctx.info(&format!("Authenticated {}\n", username));
    print_user(&user);

    Ok(())
}
