//! Hardware initialisation and the siren toggle timers.

pub mod hw_init;
pub mod hw_timer;
