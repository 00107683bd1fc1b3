use crate::{Error, Result, ServerApi};

/// Check `zone` against the zones the account can deploy to.
pub async fn validate_zone(api: &dyn ServerApi, zone: &str) -> Result<()> {
    let zones = api
        .get_zones()
        .await
        .map_err(Error::remote("list zones"))?;

    if zones.iter().any(|z| z.id == zone) {
        return Ok(());
    }

    Err(Error::InvalidZone {
        zone: zone.to_string(),
        available: zones.into_iter().map(|z| z.id).collect(),
    })
}
