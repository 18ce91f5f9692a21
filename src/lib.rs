pub mod automation;
pub mod config;
pub mod contacts;
pub mod conversations;
pub mod email;
pub mod shared;
pub mod sla;
