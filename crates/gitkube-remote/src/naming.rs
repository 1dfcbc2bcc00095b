//! Cluster-unique keys for remotes and deployments
//!
//! The git server parses these keys back apart, so the separators are part
//! of the configuration format: `-` for remotes, `.` for deployments.

/// Key of a Remote in the configuration document: `{namespace}-{name}`
pub fn qualify_remote(namespace: &str, name: &str) -> String {
    format!("{}-{}", namespace, name)
}

/// Key of a Deployment inside a remote entry: `{namespace}.{deployment}`
pub fn qualify_deployment(namespace: &str, deployment: &str) -> String {
    format!("{}.{}", namespace, deployment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_uses_dash_separator() {
        assert_eq!(qualify_remote("ns1", "r1"), "ns1-r1");
    }

    #[test]
    fn deployment_uses_dot_separator() {
        assert_eq!(qualify_deployment("ns1", "web"), "ns1.web");
    }

    #[test]
    fn empty_parts_are_kept() {
        assert_eq!(qualify_remote("", "r1"), "-r1");
        assert_eq!(qualify_deployment("ns1", ""), "ns1.");
    }
}
