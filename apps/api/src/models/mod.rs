pub mod entity;
pub mod notification;
pub mod term;
pub mod transient;
