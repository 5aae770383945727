//! user command - look up a single user

use super::{print_user, CommandContext};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct UserResult<'a> {
    server: &'a str,
    user: &'a dirgate_core::ExternalUser,
}

pub async fn execute(ctx: &CommandContext, username: &str) -> Result<()> {
    let service = ctx.service()?;
    let (user, server) = service.user(username).await?;

    if ctx.is_json() {
        return ctx.print_json(&UserResult {
            server: &server.host,
            user: &user,
        });
    }

    ctx.info(&format!("Found on {}:{}\n", server.host, server.port));
    print_user(&user);

    Ok(())
}
