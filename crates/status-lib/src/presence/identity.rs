//! Workload identity and label helpers

/// Label carrying the traefik v1 routing rule
pub const TRAEFIK_RULE_LABEL: &str = "traefik.frontend.rule";

const HOST_RULE_PREFIX: &str = "Host:";

/// Derive the identity of a workload from its group and name.
///
/// Engine instance IDs change when a container is recreated, so they can't
/// be used to recognise the same workload across scans.
pub fn workload_identity(group: &str, name: &str) -> String {
    format!("{}___{}", group, name)
}

/// Extract the first host of a `Host:a,b` routing rule.
///
/// Rules without the `Host:` prefix yield an empty string.
pub fn host_from_rule(rule: &str) -> String {
    match rule.strip_prefix(HOST_RULE_PREFIX) {
        Some(hosts) => hosts.split(',').next().unwrap_or_default().to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_identity() {
        assert_eq!(workload_identity("grp", "a"), "grp___a");
    }

    #[test]
    fn test_host_from_rule() {
        assert_eq!(
            host_from_rule("Host:foo.example.com,PathPrefix:/x"),
            "foo.example.com"
        );
        assert_eq!(host_from_rule("Host:bar.example.com"), "bar.example.com");
        assert_eq!(host_from_rule("PathPrefix:/x"), "");
        assert_eq!(host_from_rule(""), "");
    }
}
