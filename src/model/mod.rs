pub mod component;
pub mod desired;
pub mod spec;
pub mod timeline;
