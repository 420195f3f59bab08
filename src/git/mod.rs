mod gateway;
pub use gateway::{GitRunner, StashHandle};
mod switch;
pub use switch::{RefSwitch, SwitchError};
