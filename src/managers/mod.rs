pub mod backup;
pub mod cleanup;
pub mod health;
pub mod logging;
pub mod notification;
