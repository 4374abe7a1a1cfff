pub mod reset;
pub mod updater;

pub use reset::InstanceResetter;
pub use updater::{InstanceUpdater, ManifestUpdater};
