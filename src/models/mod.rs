pub mod channel;
pub mod guild;
pub mod user;

pub use channel::Channel;
pub use guild::Guild;
pub use user::User;
