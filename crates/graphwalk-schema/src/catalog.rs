//! Static type table of the remote network-access API.

use crate::error::SchemaResult;
use crate::registry::{EnumLabels, FieldDescriptor as F, Registry, TypeDescriptor as T};

fn timestamps(descriptor: T) -> T {
    descriptor
        .field(F::datetime("createdAt"))
        .field(F::datetime("updatedAt"))
}

/// Every type descriptor of the API, undecorated.
#[must_use]
pub fn descriptors() -> Vec<T> {
    vec![
        timestamps(
            T::node("RemoteNetwork")
                .field(F::string("name").label())
                .field(F::enumeration(
                    "location",
                    EnumLabels::new([
                        ("AWS", "AWS"),
                        ("AZURE", "Azure"),
                        ("GOOGLE_CLOUD", "Google Cloud"),
                        ("ON_PREMISE", "On premise"),
                        ("OTHER", "Other"),
                    ]),
                ))
                .field(F::boolean("isActive")),
        )
        .field(F::connection("resources", "Resource"))
        .field(F::connection("connectors", "Connector"))
        .filter_input("RemoteNetworkFilterInput"),
        timestamps(
            T::node("Connector")
                .field(F::string("name").label())
                .field(F::enumeration(
                    "state",
                    EnumLabels::new([
                        ("ALIVE", "Alive"),
                        ("DEAD_NO_HEARTBEAT", "Dead (no heartbeat)"),
                        ("DEAD_HEARTBEAT_TOO_OLD", "Dead (heartbeat too old)"),
                        ("DEAD_NO_RELAYS", "Dead (no relays)"),
                    ]),
                ))
                .field(F::datetime("lastHeartbeatAt"))
                .field(F::string("hostname"))
                .field(F::string("version"))
                .field(F::string("publicIP"))
                .field(F::string("privateIPs").list())
                .field(F::boolean("hasStatusNotificationsEnabled")),
        )
        .field(F::node("remoteNetwork", "RemoteNetwork"))
        .filter_input("ConnectorFilterInput"),
        timestamps(
            T::node("Resource")
                .field(F::string("name").label())
                .field(F::object("address", "ResourceAddress"))
                .field(F::string("alias"))
                .field(F::object("protocols", "ResourceProtocols"))
                .field(F::boolean("isActive"))
                .field(F::boolean("isVisible"))
                .field(F::boolean("isBrowserShortcutEnabled")),
        )
        .field(F::node("remoteNetwork", "RemoteNetwork"))
        .field(F::node("securityPolicy", "SecurityPolicy"))
        .field(F::connection("groups", "Group"))
        .field(F::connection("serviceAccounts", "ServiceAccount"))
        .filter_input("ResourceFilterInput"),
        T::object("ResourceAddress")
            .field(F::enumeration(
                "type",
                EnumLabels::new([("IP", "IP"), ("DNS", "DNS")]),
            ))
            .field(F::string("value")),
        T::object("ResourceProtocols")
            .field(F::boolean("allowIcmp"))
            .field(F::object("tcp", "ResourceProtocol"))
            .field(F::object("udp", "ResourceProtocol")),
        T::object("ResourceProtocol")
            .field(F::enumeration(
                "policy",
                EnumLabels::new([("ALLOW_ALL", "Allow all"), ("RESTRICTED", "Restricted")]),
            ))
            .field(F::object("ports", "PortRange").list()),
        T::object("PortRange")
            .field(F::integer("start"))
            .field(F::integer("end")),
        timestamps(
            T::node("Group")
                .field(F::string("name").label())
                .field(F::enumeration(
                    "type",
                    EnumLabels::new([("MANUAL", "Manual"), ("SYNCED", "Synced"), ("SYSTEM", "System")]),
                ))
                .field(F::boolean("isActive")),
        )
        .field(F::node("securityPolicy", "SecurityPolicy"))
        .field(F::connection("users", "User"))
        .field(F::connection("resources", "Resource"))
        .filter_input("GroupFilterInput"),
        timestamps(
            T::node("User")
                .field(F::string("email").label())
                .field(F::string("firstName"))
                .field(F::string("lastName"))
                .field(F::string("avatarUrl").ignored())
                .field(F::enumeration(
                    "role",
                    EnumLabels::new([
                        ("ADMIN", "Admin"),
                        ("DEVOPS", "DevOps"),
                        ("SUPPORT", "Support"),
                        ("MEMBER", "Member"),
                    ]),
                ))
                .field(F::enumeration(
                    "state",
                    EnumLabels::new([
                        ("ACTIVE", "Active"),
                        ("DISABLED", "Disabled"),
                        ("PENDING", "Pending"),
                    ]),
                ))
                .field(F::enumeration(
                    "type",
                    EnumLabels::new([("MANUAL", "Manual"), ("SYNCED", "Synced")]),
                )),
        )
        .field(F::connection("groups", "Group"))
        .filter_input("UserFilterInput"),
        timestamps(T::node("ServiceAccount").field(F::string("name").label()))
            .field(F::connection("resources", "Resource"))
            .field(F::connection("keys", "ServiceAccountKey"))
            .filter_input("ServiceAccountFilterInput"),
        timestamps(
            T::node("ServiceAccountKey")
                .field(F::string("name").label())
                .field(F::enumeration(
                    "status",
                    EnumLabels::new([
                        ("ACTIVE", "Active"),
                        ("REVOKED", "Revoked"),
                        ("EXPIRED", "Expired"),
                    ]),
                ))
                .field(F::datetime("expiresAt"))
                .field(F::datetime("revokedAt")),
        )
        .field(F::node("serviceAccount", "ServiceAccount")),
        timestamps(
            T::node("SecurityPolicy")
                .field(F::string("name").label())
                .field(F::enumeration(
                    "policyType",
                    EnumLabels::new([("RESOURCE", "Resource"), ("DEFAULT", "Default")]),
                )),
        )
        .field(F::connection("groups", "Group"))
        .query_connection_field("securityPolicies")
        .filter_input("SecurityPolicyFilterInput"),
        T::node("Device")
            .field(F::string("name").label())
            .field(F::string("osName"))
            .field(F::string("osVersion"))
            .field(F::string("deviceType"))
            .field(F::string("serialNumber"))
            .field(F::boolean("isTrusted"))
            .field(F::datetime("lastConnectedAt"))
            .field(F::enumeration(
                "activeState",
                EnumLabels::new([
                    ("ACTIVE", "Active"),
                    ("ARCHIVED", "Archived"),
                    ("BLOCKED", "Blocked"),
                ]),
            ))
            .field(F::node("user", "User"))
            .filter_input("DeviceFilterInput"),
    ]
}

/// The preprocessed catalog registry.
pub fn registry() -> SchemaResult<Registry> {
    Registry::build(descriptors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ID_FIELD;

    #[test]
    fn catalog_preprocesses() {
        let registry = registry().expect("catalog is consistent");
        for info in registry.types() {
            if info.is_node() {
                assert_eq!(info.fields()[0].name, ID_FIELD, "{}", info.name());
                assert!(info.label_field().is_some(), "{} has a label", info.name());
            }
        }
    }

    #[test]
    fn irregular_plural_is_overridden() {
        let registry = registry().expect("catalog");
        let policy = registry.get("SecurityPolicy").expect("type");
        let queries = policy.queries().expect("node");
        assert_eq!(queries.node_field, "securityPolicy");
        assert_eq!(queries.connection_field, "securityPolicies");
        assert_eq!(queries.query_name, "QuerySecurityPolicy");
    }
}
