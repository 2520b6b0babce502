//! Status labels observed while polling.
//!
//! Each waiter family gets its own enum. Wire literals are mapped into enum
//! members as soon as they are deserialized; values the provider does not
//! model are kept verbatim in an `Other` member so they can be reported.

use std::fmt;

/// A status label a poll loop can reason about.
pub trait WaitStatus: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The exact wire literal.
    fn as_str(&self) -> &str;
}

macro_rules! wire_status {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A label not modelled by this provider, kept verbatim.
            Other(String),
        }

        impl $name {
            /// Map a wire literal onto an enum member.
            pub fn from_wire(value: &str) -> Self {
                match value {
                    $( $wire => Self::$variant, )+
                    other => Self::Other(other.to_string()),
                }
            }
        }

        impl WaitStatus for $name {
            fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::Other(value) => value,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from_wire(&value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from_wire(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_status! {
    /// Lifecycle state of a service.
    ServiceState {
        /// Service is up.
        Running => "RUNNING",
        /// Nodes are being (re)built.
        Rebuilding => "REBUILDING",
        /// Data is being moved between nodes.
        Rebalancing => "REBALANCING",
        /// Synthetic: running, but readiness facts do not hold yet.
        WaitingForServices => "WAITING_FOR_SERVICES",
        /// Service is powered off.
        PowerOff => "POWEROFF",
    }
}

wire_status! {
    /// Synthetic labels of a service deletion.
    ServiceDeletionState {
        /// Service or its static IPs still linger.
        Deleting => "deleting",
        /// Service is gone and its static IPs are released.
        Deleted => "deleted",
    }
}

wire_status! {
    /// State of a Kafka topic.
    TopicState {
        /// Topic is usable.
        Active => "ACTIVE",
        /// Topic is being set up, also reported while it is not yet visible.
        Configuring => "CONFIGURING",
        /// Topic is being removed.
        Deleting => "DELETING",
    }
}

wire_status! {
    /// Synthetic labels of a topic creation request.
    TopicCreateState {
        /// The create request has not been accepted yet.
        Creating => "CREATING",
        /// The create request was accepted, or the topic already existed.
        Created => "CREATED",
    }
}

wire_status! {
    /// Synthetic labels of a delete call repeated until the entity is gone.
    RemovalState {
        /// The delete call has not gone through yet.
        Removing => "REMOVING",
        /// The entity is gone.
        Deleted => "DELETED",
    }
}

wire_status! {
    /// State of a project static IP address.
    StaticIpState {
        /// Allocation in progress.
        Creating => "creating",
        /// Allocated, not bound to any service.
        Created => "created",
        /// Bound to a service but not in use.
        Available => "available",
        /// Bound to a service and in use.
        Assigned => "assigned",
        /// Release in progress.
        Deleting => "deleting",
        /// Released.
        Deleted => "deleted",
        /// Synthetic: not listed yet.
        Waiting => "waiting",
    }
}

wire_status! {
    /// State of an AWS or Azure privatelink.
    PrivatelinkState {
        /// Being provisioned.
        Creating => "creating",
        /// Ready to accept connections.
        Active => "active",
        /// Being torn down.
        Deleting => "deleting",
    }
}
