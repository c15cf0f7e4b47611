use crate::env::Environment;

/// Maps a raw substrate identifier to its operator-facing display name.
///
/// Unknown identifiers pass through unchanged so new substrates still show
/// up in reports without a code change.
pub fn provider_display_name(provider_type: &str) -> String {
    let known = match provider_type.to_ascii_lowercase().as_str() {
        "ec2" | "aws" => Some("AWS"),
        "gce" | "google" => Some("GCE"),
        "azure" => Some("Azure"),
        "maas" => Some("MAAS"),
        "openstack" => Some("OpenStack"),
        "lxd" | "localhost" => Some("LXD"),
        "local" => Some("Local"),
        "joyent" => Some("Joyent"),
        "rackspace" => Some("Rackspace"),
        "cloudsigma" => Some("CloudSigma"),
        "vsphere" => Some("vSphere"),
        "manual" => Some("Manual"),
        _ => None,
    };
    match known {
        Some(name) => name.to_string(),
        None => provider_type.to_string(),
    }
}

/// Resolved display name for a connected environment.
///
/// The environment's own label wins when it carries one; otherwise the
/// provider type maps through the display table.
pub fn resolve_provider_name(env: &dyn Environment) -> String {
    match env.provider_name() {
        Some(name) => name,
        None => provider_display_name(&env.info().provider_type),
    }
}
