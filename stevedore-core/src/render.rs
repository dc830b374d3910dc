//! Placeholder substitution into manifest fields.
//!
//! Rendering never mutates the manifest: every call starts from the pristine
//! manifest fields and returns fresh strings, so an edit to the overrides file
//! between two renders changes the second result.

use crate::types::{Manifest, Port, Variable};

/// The templated manifest fields after substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub image: String,
    pub ports: Vec<Port>,
    pub volumes: Vec<String>,
    pub environment: Vec<String>,
}

/// Replace every variable's placeholder in `input`, in variable-list order.
/// All occurrences of a placeholder are replaced.
pub fn substitute(input: &str, vars: &[Variable]) -> String {
    let mut out = input.to_owned();
    for variable in vars {
        out = out.replace(&variable.placeholder, &variable.value);
    }
    out
}

/// Render every templated field of `manifest` with `vars`: each environment
/// entry, each volume bind, the image reference, and each port's three string
/// fields.
pub fn render(manifest: &Manifest, vars: &[Variable]) -> Rendered {
    let container = &manifest.container;
    Rendered {
        image: substitute(&container.image, vars),
        ports: container
            .ports
            .iter()
            .map(|port| Port {
                protocol: substitute(&port.protocol, vars),
                host_port: substitute(&port.host_port, vars),
                container_port: substitute(&port.container_port, vars),
            })
            .collect(),
        volumes: container.volumes.iter().map(|v| substitute(v, vars)).collect(),
        environment: container.environment.iter().map(|e| substitute(e, vars)).collect(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContainerSpec, ServiceId};

    fn var(placeholder: &str, value: &str) -> Variable {
        Variable {
            name: placeholder.trim_matches(|c| c == '{' || c == '}').to_owned(),
            placeholder: placeholder.into(),
            value: value.into(),
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            id: ServiceId::from("web"),
            name: "web".into(),
            description: String::new(),
            author: String::new(),
            version: String::new(),
            vendor: String::new(),
            variables: vec![],
            container: ContainerSpec {
                image: "registry/{{NAME}}:latest".into(),
                ports: vec![Port {
                    protocol: "tcp".into(),
                    host_port: "{{PORT}}".into(),
                    container_port: "80".into(),
                }],
                volumes: vec!["/srv/{{NAME}}:/data".into()],
                environment: vec!["LISTEN={{PORT}}".into(), "PEER={{PORT}}".into()],
            },
            procedures: vec![],
        }
    }

    #[test]
    fn substitute_replaces_all_occurrences() {
        let vars = vec![var("{{PORT}}", "8080")];
        assert_eq!(substitute("{{PORT}}:{{PORT}}", &vars), "8080:8080");
    }

    #[test]
    fn substitute_applies_variables_in_list_order() {
        // The first variable's replacement can expose text the second matches.
        let vars = vec![var("{{A}}", "{{B}}"), var("{{B}}", "done")];
        assert_eq!(substitute("{{A}}", &vars), "done");
    }

    #[test]
    fn substitute_leaves_unknown_placeholders_alone() {
        let vars = vec![var("{{PORT}}", "8080")];
        assert_eq!(substitute("{{HOST}}", &vars), "{{HOST}}");
    }

    #[test]
    fn render_touches_every_templated_field() {
        let vars = vec![var("{{PORT}}", "8080"), var("{{NAME}}", "web")];
        let rendered = render(&manifest(), &vars);
        assert_eq!(rendered.image, "registry/web:latest");
        assert_eq!(rendered.ports[0].host_port, "8080");
        assert_eq!(rendered.ports[0].container_port, "80");
        assert_eq!(rendered.volumes, vec!["/srv/web:/data"]);
        assert_eq!(rendered.environment, vec!["LISTEN=8080", "PEER=8080"]);
    }

    #[test]
    fn render_does_not_mutate_the_manifest() {
        let m = manifest();
        let vars = vec![var("{{PORT}}", "8080"), var("{{NAME}}", "web")];
        let _ = render(&m, &vars);
        assert_eq!(m.container.ports[0].host_port, "{{PORT}}", "manifest must stay pristine");

        // A second render with changed values reflects the change.
        let vars = vec![var("{{PORT}}", "9090"), var("{{NAME}}", "web")];
        let rendered = render(&m, &vars);
        assert_eq!(rendered.ports[0].host_port, "9090");
    }
}
