pub mod achievement;
pub mod event;
pub mod tag;
pub mod user;
