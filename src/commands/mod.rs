// Verbs that change the environment
pub mod lbs;
pub mod lifecycle;

// Read-only accessors
pub mod info;
pub mod print_env;

use anyhow::Result;
use statekit::{State, Store, bootstrap};

use crate::Context;
use crate::config;
use crate::reconciler::{self, BBL_VERSION, Reconciler, Tools};

fn store(ctx: &Context) -> Store {
    Store::new(&ctx.state_dir, BBL_VERSION)
}

/// A reconciler for verbs that write to the state directory.
fn reconciler(ctx: &Context) -> Result<Reconciler> {
    config::ensure_state_dir(&ctx.state_dir)?;
    Ok(Reconciler::new(
        store(ctx),
        Tools::system(ctx.debug),
        ctx.debug,
        !ctx.debug && !ctx.quiet,
    ))
}

/// The state as it is on disk, without migrating it. Read-only verbs
/// never rewrite the directory.
fn load_state(ctx: &Context) -> Result<State> {
    let state = bootstrap::load(&ctx.state_dir)?;
    reconciler::require_environment(&state, &store(ctx))?;
    Ok(state)
}
