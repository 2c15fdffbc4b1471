mod lazy_namespace;
mod lifecycle;
mod preload_and_update;
mod registry_dedup;
