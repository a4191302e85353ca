//! Input validation for cluster creation.

use crate::error::ValidationError;
use crate::model::ClusterSpec;

/// Availability zones accepted by the remote API.
const AVAILABILITY_ZONES: &[&str] = &["dp1", "ms1"];

/// Validate an availability zone name (case-insensitive).
pub fn availability_zone(zone: &str) -> Result<(), ValidationError> {
    let lower = zone.to_ascii_lowercase();
    if AVAILABILITY_ZONES.contains(&lower.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAvailabilityZone(zone.to_string()))
    }
}

/// Validate a spec before it is used to create a cluster.
pub fn validate_create(spec: &ClusterSpec) -> Result<(), ValidationError> {
    if spec.cluster_size == 0 {
        return Err(ValidationError::InvalidClusterSize(spec.cluster_size));
    }
    if spec.volume.size == 0 {
        return Err(ValidationError::ZeroVolumeSize("volume"));
    }
    if let Some(wal) = &spec.wal_volume {
        if wal.size == 0 {
            return Err(ValidationError::ZeroVolumeSize("wal volume"));
        }
    }
    if let Some(zone) = &spec.availability_zone {
        availability_zone(zone)?;
    }
    Ok(())
}
