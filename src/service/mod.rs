pub mod catalog_controller;
pub mod catalog_source;
pub mod fleet_loop;
pub mod reconciler_svc;
pub mod reporter;
pub mod work_queue;
