pub mod mass_update;
pub mod notification;
