//! Tool catalog: the fixed set of tools offered to the model.
//!
//! The model sees flat names (`fs_write`); the tool collaborator and the
//! approval policy work on dotted capability ids (`fs.write`).
//! [`map_tool_name`] bridges the two.

use tldw_agent_core::tool::ToolDefinition;

use ParamKind::{Boolean, Integer, String as Str, StringArray};

/// One parameter of a catalog tool.
struct Param {
    name: &'static str,
    kind: ParamKind,
    description: &'static str,
    required: bool,
}

#[derive(Clone, Copy)]
enum ParamKind {
    String,
    Integer,
    Boolean,
    StringArray,
}

struct CatalogEntry {
    name: &'static str,
    capability: &'static str,
    description: &'static str,
    params: &'static [Param],
}

const fn req(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: true,
    }
}

const fn opt(name: &'static str, kind: ParamKind, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        required: false,
    }
}

const CATALOG: &[CatalogEntry] = &[
    // --- Filesystem reads ---
    CatalogEntry {
        name: "fs_list",
        capability: "fs.list",
        description: "List the entries of a directory in the workspace.",
        params: &[
            req("path", Str, "Directory path relative to the workspace root"),
            opt("recursive", Boolean, "Descend into subdirectories"),
        ],
    },
    CatalogEntry {
        name: "fs_read",
        capability: "fs.read",
        description: "Read a text file from the workspace, optionally a line range.",
        params: &[
            req("path", Str, "File path relative to the workspace root"),
            opt("start_line", Integer, "First line to return (1-based)"),
            opt("end_line", Integer, "Last line to return (inclusive)"),
        ],
    },
    // --- Search ---
    CatalogEntry {
        name: "search_grep",
        capability: "search.grep",
        description: "Search file contents in the workspace for a regular expression.",
        params: &[
            req("pattern", Str, "Regular expression to search for"),
            opt("path", Str, "Directory to search in (defaults to the workspace root)"),
            opt("include", Str, "Glob limiting which files are searched"),
            opt("max_results", Integer, "Maximum number of matches to return"),
        ],
    },
    CatalogEntry {
        name: "search_files",
        capability: "search.files",
        description: "Find files in the workspace whose path matches a glob.",
        params: &[
            req("pattern", Str, "Glob pattern, e.g. src/**/*.rs"),
            opt("path", Str, "Directory to search in (defaults to the workspace root)"),
        ],
    },
    // --- Git reads ---
    CatalogEntry {
        name: "git_status",
        capability: "git.status",
        description: "Show the working tree status of the workspace repository.",
        params: &[],
    },
    CatalogEntry {
        name: "git_diff",
        capability: "git.diff",
        description: "Show unstaged or staged changes in the workspace repository.",
        params: &[
            opt("path", Str, "Limit the diff to this path"),
            opt("staged", Boolean, "Show staged changes instead of unstaged"),
        ],
    },
    CatalogEntry {
        name: "git_log",
        capability: "git.log",
        description: "Show recent commits in the workspace repository.",
        params: &[
            opt("limit", Integer, "Number of commits to show"),
            opt("path", Str, "Only commits touching this path"),
        ],
    },
    // --- Filesystem / git writes ---
    CatalogEntry {
        name: "fs_write",
        capability: "fs.write",
        description: "Create or overwrite a file in the workspace.",
        params: &[
            req("path", Str, "File path relative to the workspace root"),
            req("content", Str, "Full file content to write"),
        ],
    },
    CatalogEntry {
        name: "fs_apply_patch",
        capability: "fs.apply_patch",
        description: "Apply a unified diff to files in the workspace.",
        params: &[req("patch", Str, "Unified diff to apply")],
    },
    CatalogEntry {
        name: "fs_mkdir",
        capability: "fs.mkdir",
        description: "Create a directory (and missing parents) in the workspace.",
        params: &[req("path", Str, "Directory path relative to the workspace root")],
    },
    CatalogEntry {
        name: "fs_delete",
        capability: "fs.delete",
        description: "Delete a file from the workspace.",
        params: &[req("path", Str, "File path relative to the workspace root")],
    },
    CatalogEntry {
        name: "git_add",
        capability: "git.add",
        description: "Stage files in the workspace repository.",
        params: &[req("paths", StringArray, "Paths to stage")],
    },
    CatalogEntry {
        name: "git_commit",
        capability: "git.commit",
        description: "Commit staged changes in the workspace repository.",
        params: &[req("message", Str, "Commit message")],
    },
    // --- Execution ---
    CatalogEntry {
        name: "exec_run",
        capability: "exec.run",
        description: "Run an allowlisted command (tests, linters, builds) in the workspace and return its output.",
        params: &[
            req("command", Str, "Allowlisted command id, e.g. cargo_test or npm_lint"),
            opt("args", StringArray, "Extra arguments passed to the command"),
            opt("cwd", Str, "Working directory relative to the workspace root"),
        ],
    },
];

impl CatalogEntry {
    fn schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for p in self.params {
            let prop = match p.kind {
                ParamKind::String => {
                    serde_json::json!({ "type": "string", "description": p.description })
                }
                ParamKind::Integer => {
                    serde_json::json!({ "type": "integer", "description": p.description })
                }
                ParamKind::Boolean => {
                    serde_json::json!({ "type": "boolean", "description": p.description })
                }
                ParamKind::StringArray => serde_json::json!({
                    "type": "array",
                    "items": { "type": "string" },
                    "description": p.description
                }),
            };
            properties.insert(p.name.to_string(), prop);
            if p.required {
                required.push(p.name);
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.to_string(),
            description: self.description.to_string(),
            parameters: self.schema(),
        }
    }
}

/// Every tool offered to the model, in a fixed order.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    CATALOG.iter().map(CatalogEntry::to_definition).collect()
}

/// Map an LLM-facing tool name to its capability id.
///
/// Unknown names pass through unchanged so newer tools still reach the
/// collaborator; the approval policy then treats them as `individual`.
pub fn map_tool_name(name: &str) -> &str {
    CATALOG
        .iter()
        .find(|e| e.name == name)
        .map(|e| e.capability)
        .unwrap_or(name)
}

/// `(name, capability)` pairs in catalog order.
pub fn catalog_names() -> impl Iterator<Item = (&'static str, &'static str)> {
    CATALOG.iter().map(|e| (e.name, e.capability))
}
