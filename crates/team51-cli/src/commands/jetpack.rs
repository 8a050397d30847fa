//! Jetpack commands.

use anyhow::Result;
use team51_core::{CommandOutcome, SiteRef};

use super::Context;

pub async fn set_module(ctx: &Context, site: &SiteRef, module: &str, active: bool) -> Result<CommandOutcome> {
    let result = ctx.wpcom()?.set_jetpack_module(site, module, active).await?;
    let state = if result.active { "active" } else { "inactive" };
    if result.active != active {
        anyhow::bail!("Jetpack reported module {} on {} as still {}", module, site, state);
    }
    Ok(CommandOutcome::success(format!("Module {} is now {} on {}", module, state, site)))
}
