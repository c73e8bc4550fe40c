//! shipyard-nginx — proxy configuration rendering and activation.
//!
//! The delicate part of the control plane: site configs are staged under
//! `sites-available/`, the whole tree is validated with `nginx -t`, and only
//! a clean validation run flips the `sites-enabled/` symlink and reloads.
//! After any operation returns, nginx is running on a validated
//! configuration; after any failure, it is still running on the previous
//! one.
//!
//! Rendering is split from activation: [`generate`] is pure string work
//! (user templates with `<%.Var%>` placeholders, the deterministic
//! `override.conf`, the HTTPS transform), [`manager`] owns the
//! write → validate → enable → reload transaction.

pub mod error;
pub mod generate;
pub mod manager;

pub use error::{NginxError, NginxResult};
pub use generate::{
    default_template, main_conf, override_conf, override_example, render_user_config,
    transform_to_https, RenderContext,
};
pub use manager::{DeployOutcome, NginxManager, TlsMode};
