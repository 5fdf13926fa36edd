mod api;


pub use api::LifecycleApi;
