//! The update/rollback core: partition switching, artifact installation,
//! and boot validation.
//!
//! Components here never talk to the network; they operate on an injected
//! [`StateStore`](seesaw_state::StateStore), an injected [`Host`] for
//! mount/unmount/reboot, and a [`DeviceLayout`](seesaw_types::DeviceLayout)
//! naming every path. The ordering contracts between them are what give
//! the system its never-brick property: the running slot is untouched
//! until the new slot is fully populated and validated.

pub mod fstab;
pub mod fsutil;
pub mod health;
pub mod host;
pub mod installer;
pub mod switcher;
pub mod validator;

pub use health::{FixedProbe, HealthProbe, TcpReachability};
pub use host::{FakeHost, Host, HostSystem};
pub use installer::Installer;
pub use switcher::PartitionSwitcher;
pub use validator::{BootValidator, ValidatorOutcome};
