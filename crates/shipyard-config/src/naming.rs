//! Pure naming transforms shared by every adapter.
//!
//! nginx variable identifiers, rc.d service names, and pot names all derive
//! from the site domain. Each transform is defined exactly once here so the
//! proxy configurator, the container adapter, and the service supervisor can
//! never disagree about a site's derived names.

/// Replace `.` and `-` with `_`, yielding a fragment valid in nginx
/// variable names and rc.d service names.
pub fn normalize_domain(domain: &str) -> String {
    domain.replace(['.', '-'], "_")
}

/// Pot names allow hyphens but not dots.
pub fn container_name(domain: &str) -> String {
    domain.replace('.', "-")
}

/// rc.d service names use the underscore form.
pub fn service_name(domain: &str) -> String {
    normalize_domain(domain)
}
