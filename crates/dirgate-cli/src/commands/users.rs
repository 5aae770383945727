//! users command - look up several users on every server

use super::{print_user, CommandContext};
use anyhow::Result;

pub async fn execute(ctx: &CommandContext, usernames: &[String]) -> Result<()> {
    let service = ctx.service()?;
    let users = service.client().users(usernames).await?;

    if ctx.is_json() {
        return ctx.print_json(&users);
    }

    for (i, user) in users.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_user(user);
    }

    ctx.info(&format!(
        "\n{} record(s) for {} login(s)",
        users.len(),
        usernames.len()
    ));

    Ok(())
}
