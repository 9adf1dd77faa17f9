//! The fixed tool catalog
//!
//! Every tool maps to one API call: a method, a path template whose
//! `{placeholders}` are filled from path parameters, and an optional JSON
//! body built from body parameters.

use reqwest::Method;
use serde_json::{json, Map, Value};

/// Accepted shape of a single argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// A single URL path segment
    Segment,
    /// A positive integer identifier
    PositiveInteger,
    /// A dump date selector
    DumpDate,
    Boolean,
}

/// Where a validated argument ends up in the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Body,
}

/// Description of one tool argument
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub location: ParamLocation,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMethod {
    Get,
    Post,
}

impl ToolMethod {
    pub fn as_method(&self) -> Method {
        match self {
            ToolMethod::Get => Method::GET,
            ToolMethod::Post => Method::POST,
        }
    }
}

/// A named operation exposed to callers
#[derive(Debug, Clone, Copy)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub method: ToolMethod,
    pub path: &'static str,
    /// Mutating tools are never retried
    pub mutating: bool,
    pub params: &'static [ParamSpec],
}

/// Accepted values for `date` when creating a dump
pub const DUMP_DATES: [&str; 4] = ["now", "yesterday", "daily.1", "weekly.1"];

const SERVICE_NAME: ParamSpec = ParamSpec {
    name: "serviceName",
    description: "Internal name of the web hosting service",
    kind: ParamKind::Segment,
    location: ParamLocation::Path,
    required: true,
};

const DATABASE_NAME: ParamSpec = ParamSpec {
    name: "name",
    description: "Database name",
    kind: ParamKind::Segment,
    location: ParamLocation::Path,
    required: true,
};

const DUMP_ID: ParamSpec = ParamSpec {
    name: "id",
    description: "Dump identifier",
    kind: ParamKind::PositiveInteger,
    location: ParamLocation::Path,
    required: true,
};

const DOMAIN: ParamSpec = ParamSpec {
    name: "domain",
    description: "Domain name",
    kind: ParamKind::Segment,
    location: ParamLocation::Path,
    required: true,
};

const DUMP_DATE: ParamSpec = ParamSpec {
    name: "date",
    description: "Point in time to dump: now, yesterday, daily.1 or weekly.1",
    kind: ParamKind::DumpDate,
    location: ParamLocation::Body,
    required: true,
};

const SEND_EMAIL: ParamSpec = ParamSpec {
    name: "sendEmail",
    description: "Send an email once the dump is available",
    kind: ParamKind::Boolean,
    location: ParamLocation::Body,
    required: false,
};

static CATALOG: [ToolDefinition; 10] = [
    ToolDefinition {
        name: "list_hosting_services",
        description: "List the web hosting services on the account",
        method: ToolMethod::Get,
        path: "/hosting/web",
        mutating: false,
        params: &[],
    },
    ToolDefinition {
        name: "get_hosting_service",
        description: "Get the properties of a web hosting service",
        method: ToolMethod::Get,
        path: "/hosting/web/{serviceName}",
        mutating: false,
        params: &[SERVICE_NAME],
    },
    ToolDefinition {
        name: "list_attached_domains",
        description: "List the domains attached to a web hosting service",
        method: ToolMethod::Get,
        path: "/hosting/web/{serviceName}/attachedDomain",
        mutating: false,
        params: &[SERVICE_NAME],
    },
    ToolDefinition {
        name: "list_databases",
        description: "List the databases of a web hosting service",
        method: ToolMethod::Get,
        path: "/hosting/web/{serviceName}/database",
        mutating: false,
        params: &[SERVICE_NAME],
    },
    ToolDefinition {
        name: "get_database",
        description: "Get the properties of a hosting database",
        method: ToolMethod::Get,
        path: "/hosting/web/{serviceName}/database/{name}",
        mutating: false,
        params: &[SERVICE_NAME, DATABASE_NAME],
    },
    ToolDefinition {
        name: "list_database_dumps",
        description: "List the dumps available for a hosting database",
        method: ToolMethod::Get,
        path: "/hosting/web/{serviceName}/database/{name}/dump",
        mutating: false,
        params: &[SERVICE_NAME, DATABASE_NAME],
    },
    ToolDefinition {
        name: "create_database_dump",
        description: "Request a new dump of a hosting database",
        method: ToolMethod::Post,
        path: "/hosting/web/{serviceName}/database/{name}/dump",
        mutating: true,
        params: &[SERVICE_NAME, DATABASE_NAME, DUMP_DATE, SEND_EMAIL],
    },
    ToolDefinition {
        name: "restore_database_dump",
        description: "Restore a hosting database from one of its dumps",
        method: ToolMethod::Post,
        path: "/hosting/web/{serviceName}/database/{name}/dump/{id}/restore",
        mutating: true,
        params: &[SERVICE_NAME, DATABASE_NAME, DUMP_ID],
    },
    ToolDefinition {
        name: "list_domains",
        description: "List the domain names on the account",
        method: ToolMethod::Get,
        path: "/domain",
        mutating: false,
        params: &[],
    },
    ToolDefinition {
        name: "get_domain",
        description: "Get the properties of a domain name",
        method: ToolMethod::Get,
        path: "/domain/{domain}",
        mutating: false,
        params: &[DOMAIN],
    },
];

/// All tools, in a stable order
pub fn catalog() -> &'static [ToolDefinition] {
    &CATALOG
}

pub fn find(name: &str) -> Option<&'static ToolDefinition> {
    CATALOG.iter().find(|tool| tool.name == name)
}

impl ToolDefinition {
    /// JSON Schema describing the accepted arguments
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in self.params {
            let schema = match param.kind {
                ParamKind::Segment => json!({
                    "type": "string",
                    "pattern": "^[A-Za-z0-9._-]{1,255}$",
                    "description": param.description,
                }),
                ParamKind::PositiveInteger => json!({
                    "type": "integer",
                    "minimum": 1,
                    "description": param.description,
                }),
                ParamKind::DumpDate => json!({
                    "type": "string",
                    "enum": DUMP_DATES,
                    "description": param.description,
                }),
                ParamKind::Boolean => json!({
                    "type": "boolean",
                    "description": param.description,
                }),
            };
            properties.insert(param.name.to_string(), schema);
            if param.required {
                required.push(Value::String(param.name.to_string()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Name, description and schema as one JSON value
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "method": self.method.as_method().as_str(),
            "path": self.path,
            "mutating": self.mutating,
            "inputSchema": self.input_schema(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<_> = catalog().iter().map(|t| t.name).collect();
        assert_eq!(names.len(), catalog().len());
        assert_eq!(catalog().len(), 10);
    }

    #[test]
    fn test_path_placeholders_match_path_params() {
        for tool in catalog() {
            for param in tool.params.iter().filter(|p| p.location == ParamLocation::Path) {
                let placeholder = format!("{{{}}}", param.name);
                assert!(
                    tool.path.contains(&placeholder),
                    "{} is missing {}",
                    tool.name,
                    placeholder
                );
            }
            let placeholders = tool.path.matches('{').count();
            let path_params = tool
                .params
                .iter()
                .filter(|p| p.location == ParamLocation::Path)
                .count();
            assert_eq!(placeholders, path_params, "{}", tool.name);
        }
    }

    #[test]
    fn test_only_post_tools_mutate() {
        for tool in catalog() {
            assert_eq!(tool.mutating, tool.method == ToolMethod::Post, "{}", tool.name);
        }
    }

    #[test]
    fn test_input_schema() {
        let tool = find("create_database_dump").unwrap();
        let schema = tool.input_schema();
        assert_eq!(schema["required"], json!(["serviceName", "name", "date"]));
        assert_eq!(schema["properties"]["date"]["enum"], json!(DUMP_DATES));
        assert_eq!(schema["properties"]["sendEmail"]["type"], "boolean");
        assert_eq!(schema["additionalProperties"], false);

        let described = find("list_domains").unwrap().describe();
        assert_eq!(described["method"], "GET");
        assert_eq!(described["inputSchema"]["required"], json!([]));
    }

    #[test]
    fn test_find_unknown_tool() {
        assert!(find("delete_everything").is_none());
    }
}
