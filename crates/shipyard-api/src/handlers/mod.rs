//! Request handlers, one module per endpoint group.

pub mod common;
pub mod deploy_backend;
pub mod deploy_frontend;
pub mod deploy_self;
pub mod health;
pub mod logs;
pub mod nginx_example;
pub mod site_create;
pub mod site_destroy;
pub mod site_init;
pub mod sites;
pub mod ws_logs;
