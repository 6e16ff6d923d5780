pub mod directory;
pub mod location;
pub mod rides;

pub use directory::UserDirectory;
pub use location::LocationStore;
pub use rides::RideStore;
