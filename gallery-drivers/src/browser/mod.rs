pub mod session;
pub mod stealth;
pub mod tab;
