//! Gardener resources consumed by the operator.
//!
//! - [`Shoot`]: a managed cluster and its advertised API addresses
//! - [`ShootState`]: provisioning data of a shoot, including its cluster CA

mod shoot;
mod shoot_state;

pub use shoot::{Shoot, ShootAdvertisedAddress, ShootSpec, ShootStatus};
pub use shoot_state::{GardenerResourceData, ShootState, ShootStateSpec};
