//! Pure config generation: user template rendering, default site
//! templates, the deterministic `override.conf`, and the HTTPS transform.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use shipyard_config::naming::normalize_domain;
use shipyard_config::SiteConfig;

use crate::error::{NginxError, NginxResult};

/// Everything template rendering can substitute for one site.
pub struct RenderContext<'a> {
    pub domain: &'a str,
    pub site: &'a SiteConfig,
    pub acme_webroot: &'a str,
    pub cert_path: String,
    pub key_path: String,
}

/// Default template for a frontend-only site.
const FRONTEND_TEMPLATE: &str = r#"server {
    listen 80;
    server_name <%.Domain%>;

    root <%.FrontendRoot%>/<%.FrontendVersionVar%>;
    index index.html;

    add_header X-Robots-Tag <%.RobotsTagVar%> always;

    location /.well-known/acme-challenge/ {
        root <%.AcmeWebroot%>;
    }

    location / {
        try_files $uri $uri/ /index.html;
    }
}
"#;

/// Default template for a site with both a frontend tree and a backend.
/// Requests under the proxy path are forwarded with the prefix stripped;
/// the jail shares the host network, so the backend listens on loopback.
const COMBINED_TEMPLATE: &str = r#"server {
    listen 80;
    server_name <%.Domain%>;

    root <%.FrontendRoot%>/<%.FrontendVersionVar%>;
    index index.html;

    add_header X-Robots-Tag <%.RobotsTagVar%> always;

    location /.well-known/acme-challenge/ {
        root <%.AcmeWebroot%>;
    }

    location <%.ProxyPath%>/ {
        rewrite ^<%.ProxyPath%>/(.*)$ /$1 break;
        proxy_pass http://127.0.0.1:<%.ListenPort%>;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }

    location / {
        try_files $uri $uri/ /index.html;
    }
}
"#;

/// Default template for a backend-only site (pure proxy, no frontend root).
const BACKEND_ONLY_TEMPLATE: &str = r#"server {
    listen 80;
    server_name <%.Domain%>;

    location /.well-known/acme-challenge/ {
        root <%.AcmeWebroot%>;
    }

    location <%.ProxyPath%>/ {
        rewrite ^<%.ProxyPath%>/(.*)$ /$1 break;
        proxy_pass http://127.0.0.1:<%.ListenPort%>;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }
}
"#;

/// Pick the default template for a site's shape.
pub fn default_template(site: &SiteConfig) -> &'static str {
    match (site.has_frontend(), site.backend.is_some()) {
        (true, true) => COMBINED_TEMPLATE,
        (false, true) => BACKEND_ONLY_TEMPLATE,
        _ => FRONTEND_TEMPLATE,
    }
}

/// Render a user-supplied (or default) template for a site.
///
/// Placeholders are `<%.Name%>`. Unknown names, malformed tokens, and
/// unterminated placeholders are errors; a template with no placeholders
/// passes through unchanged. Backend variables error on sites without a
/// backend.
pub fn render_user_config(template: &str, ctx: &RenderContext) -> NginxResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("<%") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("%>") else {
            return Err(NginxError::UnterminatedPlaceholder);
        };
        let token = after[..end].trim();
        let name = token
            .strip_prefix('.')
            .ok_or_else(|| NginxError::MalformedPlaceholder(token.to_string()))?;
        out.push_str(&lookup_var(name, ctx)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn lookup_var(name: &str, ctx: &RenderContext) -> NginxResult<String> {
    let backend = |field: &str| {
        ctx.site
            .backend
            .as_ref()
            .ok_or_else(|| NginxError::BackendRequired(field.to_string()))
    };
    match name {
        "Domain" => Ok(ctx.domain.to_string()),
        "FrontendRoot" => Ok(ctx.site.frontend_root.clone()),
        "FrontendVersionVar" => Ok(format!("$frontend_version_{}", normalize_domain(ctx.domain))),
        "RobotsTagVar" => Ok(format!("$robots_tag_{}", normalize_domain(ctx.domain))),
        "ProxyPath" => Ok(backend(name)?.proxy_path.clone()),
        "ListenPort" => Ok(backend(name)?.listen_port.to_string()),
        "JailIP" => Ok(backend(name)?.jail_ip.clone()),
        "AcmeWebroot" => Ok(ctx.acme_webroot.to_string()),
        "CertPath" => Ok(ctx.cert_path.clone()),
        "KeyPath" => Ok(ctx.key_path.clone()),
        other => Err(NginxError::UnknownVariable(other.to_string())),
    }
}

/// Minimal HTTP-only config serving nothing but the ACME challenge path.
/// First step of the TLS bootstrap.
pub fn http_only_config(domain: &str, acme_webroot: &str) -> String {
    format!(
        r#"server {{
    listen 80;
    server_name {domain};

    location /.well-known/acme-challenge/ {{
        root {acme_webroot};
    }}

    location / {{
        return 404;
    }}
}}
"#
    )
}

/// Generate `override.conf`: the query-parameter-driven frontend version
/// override, gated per site by its permitted address list.
///
/// Output is byte-deterministic for equal inputs — sites iterate in map
/// order (sorted by domain), address lists keep input order.
pub fn override_conf(sites: &BTreeMap<String, SiteConfig>) -> String {
    let mut out = String::new();
    out.push_str("# MANAGED BY SHIPYARD - DO NOT EDIT\n");
    out.push_str("# Frontend version override routing. Regenerated on every site change.\n\n");

    out.push_str("# Map ?override=<commit> to a candidate frontend version.\n");
    out.push_str("map $arg_override $frontend_version {\n");
    out.push_str("    default \"latest\";\n");
    out.push_str("    \"~^[0-9a-f]{7,40}$\" $arg_override;\n");
    out.push_str("}\n");

    for (domain, site) in sites {
        let norm = normalize_domain(domain);
        let _ = write!(out, "\n# site: {domain}\n");

        // Who may use the override for this site.
        let _ = write!(out, "geo $override_allowed_{norm} {{\n    default 0;\n");
        for cidr in &site.override_ips {
            let _ = write!(out, "    {cidr} 1;\n");
        }
        out.push_str("}\n");

        // Effective version: the requested override only when permitted.
        let _ = write!(
            out,
            "map \"$override_allowed_{norm}:$frontend_version\" $frontend_version_{norm} {{\n"
        );
        out.push_str("    default \"latest\";\n");
        out.push_str("    \"~^1:(?<version>.+)$\" $version;\n");
        out.push_str("}\n");

        // Overridden responses must not be indexed.
        let _ = write!(
            out,
            "map $frontend_version_{norm} $robots_tag_{norm} {{\n"
        );
        out.push_str("    \"latest\" \"\";\n");
        out.push_str("    default \"noindex\";\n");
        out.push_str("}\n");
    }

    out
}

/// Main nginx.conf written once at bootstrap. Site configs and the
/// override map are pulled in through the two include directives.
pub fn main_conf() -> String {
    r#"# MANAGED BY SHIPYARD - DO NOT EDIT
worker_processes auto;

events {
    worker_connections 1024;
}

http {
    include /usr/local/etc/nginx/mime.types;
    default_type application/octet-stream;
    sendfile on;
    keepalive_timeout 65;

    include /usr/local/etc/nginx/override.conf;
    include /usr/local/etc/nginx/sites-enabled/*.conf;
}
"#
    .to_string()
}

/// Rewrite an HTTP server config into its HTTPS form: a port-80 block that
/// keeps serving the ACME path and redirects everything else, plus the
/// original block on 443 with the certificate directives injected after the
/// `listen` line (indentation preserved).
pub fn transform_to_https(
    config: &str,
    domain: &str,
    cert_path: &str,
    key_path: &str,
    acme_webroot: &str,
) -> String {
    let mut out = format!(
        r#"server {{
    listen 80;
    server_name {domain};

    location /.well-known/acme-challenge/ {{
        root {acme_webroot};
    }}

    location / {{
        return 301 https://$host$request_uri;
    }}
}}

"#
    );

    for line in config.lines() {
        if line.trim() == "listen 80;" {
            let indent = get_indent(line);
            let _ = write!(out, "{indent}listen 443 ssl;\n");
            let _ = write!(out, "{indent}ssl_certificate {cert_path};\n");
            let _ = write!(out, "{indent}ssl_certificate_key {key_path};\n");
            let _ = write!(out, "{indent}ssl_protocols TLSv1.2 TLSv1.3;\n");
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

/// Example template served by `/nginx/example`, documenting every variable
/// the renderer understands.
pub fn override_example() -> String {
    r#"# Example shipyard nginx site template.
#
# Available template variables:
#   <%.Domain%>              site domain
#   <%.FrontendRoot%>        commit-addressed frontend tree root
#   <%.FrontendVersionVar%>  per-site variable naming the served version
#   <%.RobotsTagVar%>        per-site X-Robots-Tag value for overrides
#   <%.ProxyPath%>           backend URI prefix (backend sites only)
#   <%.ListenPort%>          backend listen port (backend sites only)
#   <%.JailIP%>              backend jail address (backend sites only)
#   <%.AcmeWebroot%>         directory serving /.well-known/acme-challenge/
#   <%.CertPath%>            TLS certificate path (ssl sites only)
#   <%.KeyPath%>             TLS private key path (ssl sites only)

server {
    listen 80;
    server_name <%.Domain%>;

    root <%.FrontendRoot%>/<%.FrontendVersionVar%>;
    index index.html;

    add_header X-Robots-Tag <%.RobotsTagVar%> always;

    location /.well-known/acme-challenge/ {
        root <%.AcmeWebroot%>;
    }

    location / {
        try_files $uri $uri/ /index.html;
    }
}
"#
    .to_string()
}

/// Leading whitespace of a line.
fn get_indent(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}
