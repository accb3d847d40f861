//! Network infrastructure — implements `PortAllocator`.

use std::net::{Ipv4Addr, TcpListener};

use anyhow::{Context, Result};

use crate::application::ports::PortAllocator;

/// Asks the kernel for a free port by binding port 0, then releases it.
///
/// Nothing holds the port afterwards, so another process can take it before
/// the hypervisor binds it. The kernel avoids handing out a just-released
/// ephemeral port straight away, which makes this rare in practice.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralPortAllocator;

impl PortAllocator for EphemeralPortAllocator {
    fn allocate(&self) -> Result<u16> {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0))
            .context("cannot bind an ephemeral port")?;
        let port = listener
            .local_addr()
            .context("cannot read the ephemeral port")?
            .port();
        drop(listener);
        Ok(port)
    }
}
