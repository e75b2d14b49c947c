pub mod prelude;

pub mod choice;
pub mod poll;
pub mod question;
pub mod user;
