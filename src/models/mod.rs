pub mod delivery;
pub mod driver;
pub mod earning;
pub mod location;
pub mod notification;
