// The miette/thiserror derive macros generate code that triggers false
// positive unused_assignments warnings on enum variant fields.
#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use regex::Regex;
use thiserror::Error;

use crate::config::model::RigConfig;

// ---------------------------------------------------------------------------
// ConfigDiagnostic: template and settings errors with source spans
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigDiagnostic {
    #[error("template `{template}` has an empty image")]
    #[diagnostic(code(svcrig::empty_image))]
    EmptyImage {
        #[source_code]
        src: NamedSource<String>,
        #[label("image is empty")]
        span: SourceSpan,
        template: String,
    },

    #[error("template `{template}` has base port 0")]
    #[diagnostic(
        code(svcrig::zero_port),
        help("the base port is where the port search starts; pick a port between 1 and 65535")
    )]
    ZeroPort {
        #[source_code]
        src: NamedSource<String>,
        #[label("port must be non-zero")]
        span: SourceSpan,
        template: String,
    },

    #[error("template `{template}` has container_port 0")]
    #[diagnostic(code(svcrig::zero_container_port))]
    ZeroContainerPort {
        #[source_code]
        src: NamedSource<String>,
        #[label("container_port must be non-zero")]
        span: SourceSpan,
        template: String,
    },

    #[error("template `{template}` has an empty command")]
    #[diagnostic(
        code(svcrig::empty_command),
        help("omit `command` to use the image's default")
    )]
    EmptyCommand {
        #[source_code]
        src: NamedSource<String>,
        #[label("command is empty")]
        span: SourceSpan,
        template: String,
    },

    #[error("invalid template name `{template}`")]
    #[diagnostic(
        code(svcrig::invalid_template_name),
        help("template names may only contain lowercase letters, digits and `_`")
    )]
    InvalidTemplateName {
        #[source_code]
        src: NamedSource<String>,
        #[label("used in service ids and directory names")]
        span: SourceSpan,
        template: String,
    },

    #[error("settings.host is empty")]
    #[diagnostic(
        code(svcrig::empty_host),
        help("use `localhost`, an address, or `auto`")
    )]
    EmptyHost {
        #[source_code]
        src: NamedSource<String>,
        #[label("host is empty")]
        span: SourceSpan,
    },
}

// ---------------------------------------------------------------------------
// Source span helpers
// ---------------------------------------------------------------------------

/// Find the byte offset of a TOML table header like `[templates.echo]`.
fn find_table_span(source: &str, section: &str, name: &str) -> SourceSpan {
    let patterns = [
        format!("[{}.{}]", section, name),
        format!("[{}.{}", section, name),
    ];

    for pat in &patterns {
        if let Some(pos) = source.find(pat) {
            let name_start = pos + 1 + section.len() + 1;
            return (name_start, name.len()).into();
        }
    }

    if let Some(pos) = source.find(name) {
        return (pos, name.len()).into();
    }

    (0, 0).into()
}

/// Find the byte offset of a specific field value in a TOML section.
fn find_field_span(source: &str, section: &str, name: &str, field: &str) -> SourceSpan {
    let table_header = if name.is_empty() {
        format!("[{}]", section)
    } else {
        format!("[{}.{}]", section, name)
    };
    let search_start = source.find(&table_header).unwrap_or(0);
    let after_header = &source[search_start..];

    for prefix in [format!("{} =", field), format!("{}=", field)] {
        if let Some(rel_pos) = after_header.find(&prefix) {
            let abs_pos = search_start + rel_pos;
            let val_start = abs_pos + prefix.len();
            let val_trimmed = source[val_start..].trim_start();
            let trim_offset = val_start + (source[val_start..].len() - val_trimmed.len());
            let val_end = val_trimmed.find('\n').unwrap_or(val_trimmed.len());
            return (trim_offset, val_end).into();
        }
    }

    if name.is_empty() {
        return (search_start, table_header.len()).into();
    }
    find_table_span(source, section, name)
}

// ---------------------------------------------------------------------------
// Main validation function
// ---------------------------------------------------------------------------

pub fn validate(
    config: &RigConfig,
    source: &str,
    filename: &str,
) -> Result<(), Vec<ConfigDiagnostic>> {
    let mut errors = Vec::new();
    let src = NamedSource::new(filename, source.to_string());
    let name_re = Regex::new(r"^[a-z0-9_]+$").expect("static regex is valid");

    if config.settings.host.trim().is_empty() {
        errors.push(ConfigDiagnostic::EmptyHost {
            src: src.clone(),
            span: find_field_span(source, "settings", "", "host"),
        });
    }

    for (name, template) in &config.templates {
        if !name_re.is_match(name) {
            errors.push(ConfigDiagnostic::InvalidTemplateName {
                src: src.clone(),
                span: find_table_span(source, "templates", name),
                template: name.clone(),
            });
        }
        if template.image.trim().is_empty() {
            errors.push(ConfigDiagnostic::EmptyImage {
                src: src.clone(),
                span: find_field_span(source, "templates", name, "image"),
                template: name.clone(),
            });
        }
        if template.port == 0 {
            errors.push(ConfigDiagnostic::ZeroPort {
                src: src.clone(),
                span: find_field_span(source, "templates", name, "port"),
                template: name.clone(),
            });
        }
        if template.container_port == 0 {
            errors.push(ConfigDiagnostic::ZeroContainerPort {
                src: src.clone(),
                span: find_field_span(source, "templates", name, "container_port"),
                template: name.clone(),
            });
        }
        if template
            .command
            .as_ref()
            .is_some_and(|c| c.as_slice().iter().all(|part| part.trim().is_empty()))
        {
            errors.push(ConfigDiagnostic::EmptyCommand {
                src: src.clone(),
                span: find_field_span(source, "templates", name, "command"),
                template: name.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(source: &str) -> Result<(), Vec<ConfigDiagnostic>> {
        let config: RigConfig = toml::from_str(source).unwrap();
        validate(&config, source, "svcrig.toml")
    }

    #[test]
    fn valid_config_passes() {
        let source = r#"
[templates.echo]
image = "hashicorp/http-echo"
port = 9100
"#;
        assert!(check(source).is_ok());
    }

    #[test]
    fn empty_config_passes() {
        assert!(check("").is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let source = r#"
[settings]
host = ""

[templates.Echo]
image = ""
port = 0
container_port = 0
command = []
"#;
        let errors = check(source).unwrap_err();
        assert_eq!(errors.len(), 6, "got: {errors:?}");
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigDiagnostic::InvalidTemplateName { template, .. } if template == "Echo")));
        assert!(errors.iter().any(|e| matches!(e, ConfigDiagnostic::EmptyHost { .. })));
    }

    #[test]
    fn port_span_points_at_value() {
        let source = "[templates.web]\nimage = \"nginx\"\nport = 0\n";
        let span = find_field_span(source, "templates", "web", "port");
        assert_eq!(&source[span.offset()..span.offset() + span.len()], "0");
    }

    #[test]
    fn diagnostics_implement_miette_diagnostic() {
        let source = "[templates.web]\nimage = \"\"\nport = 80\n";
        let errors = check(source).unwrap_err();
        let diag: &dyn miette::Diagnostic = &errors[0];
        assert_eq!(
            diag.code().map(|c| c.to_string()).as_deref(),
            Some("svcrig::empty_image")
        );
    }
}
