// Discovery module - the two facts a pod route needs: where the VM is, and
// which address range its workloads live in

pub mod pod_cidr;
pub mod vm_address;

pub use pod_cidr::{DEFAULT_POD_CIDR, default_pod_cidr, discover_pod_cidr};
pub use vm_address::discover_vm_address;
