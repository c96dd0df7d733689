pub mod mass_update;
