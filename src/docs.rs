//! Markdown documentation for resources and data sources
//!
//! One page per type, laid out the way registry documentation is: a schema
//! section split into required, optional and read-only attributes, followed by
//! one section per nested attribute.

use crate::provider::Provider;
use crate::schema::{Attributes, Schema};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::debug;

const PAGE_TEMPLATE: &str = r#"---
page_title: "{{ type_name }} {{ label }} - k8s-crd-provider"
description: |-
  {{ description }}
---

# {{ type_name }} ({{ label }})

{{ description }}

## Schema
{% for section in sections %}{% if not loop.first %}
<a id="{{ section.anchor }}"></a>
### Nested Schema for `{{ section.path }}`
{% endif %}{% for group in section.groups %}
### {{ group.title }}

{% for row in group.rows %}- `{{ row.name }}` ({{ row.type_name }}{% if row.sensitive %}, Sensitive{% endif %}){% if row.description %} {{ row.description }}{% endif %}{% if row.constraints %} Must be {{ row.constraints }}.{% endif %}{% if row.requires_replace %} Changing this forces a new object.{% endif %}{% if row.link %} (see [below for nested schema](#{{ row.link }})){% endif %}
{% endfor %}{% endfor %}{% endfor %}"#;

#[derive(Debug, Serialize)]
struct Row {
    name: String,
    type_name: String,
    description: Option<String>,
    constraints: Option<String>,
    sensitive: bool,
    requires_replace: bool,
    link: Option<String>,
}

#[derive(Debug, Serialize)]
struct Group {
    title: &'static str,
    rows: Vec<Row>,
}

#[derive(Debug, Serialize)]
struct Section {
    path: String,
    anchor: String,
    groups: Vec<Group>,
}

fn anchor(path: &str) -> String {
    format!("nestedatt--{}", path.replace('.', "--"))
}

fn collect_sections(attributes: &Attributes, path: &str, sections: &mut Vec<Section>) {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    let mut read_only = Vec::new();
    let mut nested = Vec::new();

    for (name, attribute) in attributes {
        let child_path = if path.is_empty() {
            name.clone()
        } else {
            format!("{path}.{name}")
        };
        let link = attribute.ty.nested().map(|attrs| {
            nested.push((child_path.clone(), attrs));
            anchor(&child_path)
        });
        let constraints = (!attribute.validators.is_empty()).then(|| {
            attribute
                .validators
                .iter()
                .map(|v| v.description())
                .collect::<Vec<_>>()
                .join(" and ")
        });

        let row = Row {
            name: name.clone(),
            type_name: attribute.ty.type_name(),
            description: attribute
                .description
                .as_ref()
                .map(|d| d.split_whitespace().collect::<Vec<_>>().join(" ")),
            constraints,
            sensitive: attribute.sensitive,
            requires_replace: attribute.requires_replace,
            link,
        };

        if attribute.required {
            required.push(row);
        } else if attribute.optional {
            optional.push(row);
        } else {
            read_only.push(row);
        }
    }

    let groups = [("Required", required), ("Optional", optional), ("Read-Only", read_only)]
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(title, rows)| Group { title, rows })
        .collect();

    sections.push(Section {
        path: path.to_string(),
        anchor: anchor(path),
        groups,
    });

    for (child_path, attrs) in nested {
        collect_sections(attrs, &child_path, sections);
    }
}

/// Render the documentation page of one schema
pub fn render_page(type_name: &str, label: &str, schema: &Schema) -> Result<String> {
    let mut sections = Vec::new();
    collect_sections(&schema.attributes, "", &mut sections);

    let mut tera = Tera::default();
    tera.add_raw_template("page", PAGE_TEMPLATE)?;

    let mut context = Context::new();
    context.insert("type_name", type_name);
    context.insert("label", label);
    context.insert("description", schema.description.as_deref().unwrap_or(""));
    context.insert("sections", &sections);

    Ok(tera.render("page", &context)?)
}

/// Every page of the provider, keyed by path relative to the docs directory
pub fn render_all(provider: &Provider) -> Result<BTreeMap<PathBuf, String>> {
    let schema = provider.schema();
    let mut pages = BTreeMap::new();

    for (type_name, schema) in &schema.resource_schemas {
        pages.insert(
            page_path("resources", type_name),
            render_page(type_name, "Resource", schema)?,
        );
    }
    for (type_name, schema) in &schema.data_source_schemas {
        pages.insert(
            page_path("data-sources", type_name),
            render_page(type_name, "Data Source", schema)?,
        );
    }
    Ok(pages)
}

/// Write every page below `dir`; returns the number of pages written
pub fn write_docs(provider: &Provider, dir: &Path) -> Result<usize> {
    let pages = render_all(provider)?;
    for (relative, content) in &pages {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        debug!("Wrote {:?}", path);
    }
    Ok(pages.len())
}

fn page_path(kind: &str, type_name: &str) -> PathBuf {
    let name = type_name.strip_prefix("k8s_").unwrap_or(type_name);
    Path::new(kind).join(format!("{name}.md"))
}
