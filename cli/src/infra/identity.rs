//! Local user identity — implements `LocalIdentity`.

use anyhow::{Context, Result};

use crate::application::ports::LocalIdentity;

/// Looks up the account of the real user id, ignoring `USER`/`LOGNAME`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

#[cfg(unix)]
impl LocalIdentity for SystemIdentity {
    fn current_user(&self) -> Result<String> {
        use nix::unistd::{Uid, User};

        let uid = Uid::current();
        let user = User::from_uid(uid)
            .with_context(|| format!("cannot look up uid {uid}"))?
            .with_context(|| format!("uid {uid} has no passwd entry"))?;
        Ok(user.name)
    }
}

#[cfg(not(unix))]
impl LocalIdentity for SystemIdentity {
    fn current_user(&self) -> Result<String> {
        std::env::var("USERNAME").context("cannot determine the current user")
    }
}
