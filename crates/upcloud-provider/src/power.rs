//! Idempotent power transitions.
//!
//! Both helpers read the current state first and only issue a stop/start
//! when the server is not already where it needs to be.

use tracing::{debug, info};
use upcloud_api::{ServerDetails, ServerState};

use crate::{Error, Result, ServerApi};

pub async fn ensure_stopped(api: &dyn ServerApi, uuid: &str) -> Result<ServerDetails> {
    let details = api
        .get_server_details(uuid)
        .await
        .map_err(Error::remote("read server details"))?;

    if details.state == ServerState::Stopped {
        debug!(server_uuid = %uuid, "upcloud: server already stopped");
        return Ok(details);
    }

    api.stop_server(uuid)
        .await
        .map_err(Error::remote("stop server"))?;
    let details = api
        .wait_for_server_state(uuid, ServerState::Stopped)
        .await
        .map_err(Error::remote("wait for server to stop"))?;

    info!(server_uuid = %uuid, "upcloud: server stopped");
    Ok(details)
}

pub async fn ensure_started(api: &dyn ServerApi, uuid: &str) -> Result<ServerDetails> {
    let details = api
        .get_server_details(uuid)
        .await
        .map_err(Error::remote("read server details"))?;

    if details.state == ServerState::Started {
        debug!(server_uuid = %uuid, "upcloud: server already started");
        return Ok(details);
    }

    api.start_server(uuid)
        .await
        .map_err(Error::remote("start server"))?;
    let details = api
        .wait_for_server_state(uuid, ServerState::Started)
        .await
        .map_err(Error::remote("wait for server to start"))?;

    info!(server_uuid = %uuid, "upcloud: server started");
    Ok(details)
}
