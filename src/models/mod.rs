pub mod workload;

pub use workload::{
    ClusterContext, ContainerStatus, Deployment, Pod, PortMapping, SessionTarget, WorkloadKind,
};
