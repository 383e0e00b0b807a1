pub mod attendance;
pub mod export;
pub mod member;
pub mod tap;
