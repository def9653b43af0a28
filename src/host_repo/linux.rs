// Linux-specific helpers: /etc/os-release.

/// PRETTY_NAME from /etc/os-release, falling back to NAME.
pub(super) fn read_os_pretty_name() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let content = std::fs::read_to_string("/etc/os-release").ok()?;
        os_release_value(&content, "PRETTY_NAME").or_else(|| os_release_value(&content, "NAME"))
    }
    #[cfg(not(target_os = "linux"))]
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn os_release_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let v = line
            .strip_prefix(key)?
            .strip_prefix('=')?
            .trim()
            .trim_matches('"');
        (!v.is_empty()).then(|| v.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::os_release_value;

    #[test]
    fn os_release_keys() {
        let content = "NAME=\"Ubuntu\"\nPRETTY_NAME=\"Ubuntu 22.04.4 LTS\"\nEMPTY=\"\"\n";
        assert_eq!(
            os_release_value(content, "PRETTY_NAME").as_deref(),
            Some("Ubuntu 22.04.4 LTS")
        );
        assert_eq!(os_release_value(content, "NAME").as_deref(), Some("Ubuntu"));
        assert_eq!(os_release_value(content, "EMPTY"), None);
        assert_eq!(os_release_value(content, "VERSION"), None);
    }
}
