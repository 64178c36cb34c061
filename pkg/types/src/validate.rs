use anyhow::{Result, bail};

/// Validate a namespace name as the cluster API server would (DNS-1123 label).
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, starts and ends alphanumeric.
pub fn validate_namespace_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("namespace name must not be empty");
    }
    if name.len() > 63 {
        bail!(
            "namespace name '{}' exceeds 63 characters (got {})",
            name,
            name.len()
        );
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("namespace name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "namespace name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}
