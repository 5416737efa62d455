pub mod enums;
pub mod message;
pub mod room;
pub mod user;

pub use message::*;
pub use room::*;
pub use user::*;
