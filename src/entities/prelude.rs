#![allow(unused_imports)]

pub use super::choice::Entity as Choice;
pub use super::poll::Entity as Poll;
pub use super::question::Entity as Question;
pub use super::user::Entity as User;
