//! Tool catalog exposed to the model and dispatch onto an [`ActionExecutor`].
//!
//! Capabilities are described by a static registry rather than discovered at
//! run time. The catalog derived from it is deterministic: the same capability
//! set always yields the same ordered list of definitions, with the synthetic
//! `finish` tool appended last.

pub mod executor;
pub mod http;

use serde_json::{Map, Value};

use crate::api::{ParamType, ToolCall, ToolDefinition, ToolParameter};
use crate::errors::ToolError;
use crate::types::ToolName;

pub use executor::{ActionExecutor, ElementInfo, SessionFactory};

/// Name of the synthetic tool the model calls to declare completion.
pub const FINISH_TOOL: &str = "finish";

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    /// `None` when the backend leaves the type undeclared; treated as string.
    pub ty: Option<ParamType>,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct CapabilitySpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

const fn required(name: &'static str, ty: ParamType, description: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        ty: Some(ty),
        default: None,
        description,
    }
}

const SELECTOR: ParamSpec = required(
    "selector",
    ParamType::String,
    "CSS selector of the target element.",
);

pub(crate) const NAVIGATE: CapabilitySpec = CapabilitySpec {
    name: "navigate",
    description: "Navigates to a given URL.",
    params: &[required("url", ParamType::String, "The URL to navigate to.")],
};

const CLICK: CapabilitySpec = CapabilitySpec {
    name: "click",
    description: "Clicks on an element specified by a CSS selector.",
    params: &[SELECTOR],
};

const TYPE_TEXT: CapabilitySpec = CapabilitySpec {
    name: "type_text",
    description: "Types text into an input field specified by a CSS selector.",
    params: &[
        SELECTOR,
        required("text", ParamType::String, "The text to type."),
    ],
};

pub(crate) const GET_TEXT: CapabilitySpec = CapabilitySpec {
    name: "get_text",
    description: "Gets the text content of an element.",
    params: &[SELECTOR],
};

pub(crate) const GET_HTML: CapabilitySpec = CapabilitySpec {
    name: "get_html",
    description: "Gets the HTML content of an element. Defaults to the whole body.",
    params: &[ParamSpec {
        name: "selector",
        ty: Some(ParamType::String),
        default: Some("body"),
        description: "CSS selector of the element. Defaults to 'body'.",
    }],
};

pub(crate) const SCROLL: CapabilitySpec = CapabilitySpec {
    name: "scroll",
    description: "Scrolls the page 'up' or 'down' by a number of pixels.",
    params: &[
        required("direction", ParamType::String, "Either 'up' or 'down'."),
        required("pixels", ParamType::Integer, "Distance to scroll in pixels."),
    ],
};

pub(crate) const WAIT: CapabilitySpec = CapabilitySpec {
    name: "wait",
    description: "Waits for a number of seconds.",
    params: &[required("seconds", ParamType::Integer, "Seconds to wait.")],
};

const FIND_ELEMENTS: CapabilitySpec = CapabilitySpec {
    name: "find_elements",
    description: "Finds all elements matching a CSS selector and returns their tags.",
    params: &[SELECTOR],
};

/// Full browser capability set, in the order the model sees it.
pub const BROWSER_CAPABILITIES: &[CapabilitySpec] = &[
    NAVIGATE,
    CLICK,
    TYPE_TEXT,
    GET_TEXT,
    GET_HTML,
    SCROLL,
    WAIT,
    FIND_ELEMENTS,
];

fn finish_definition() -> ToolDefinition {
    ToolDefinition {
        name: ToolName::new(FINISH_TOOL),
        description: "Call this function when you have completed the task.".to_string(),
        parameters: vec![ToolParameter {
            name: "result".to_string(),
            ty: ParamType::String,
            required: true,
            description: "The result of the task.".to_string(),
        }],
    }
}

/// Ordered tool definitions derived from one capability set.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCatalog {
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn from_capabilities(specs: &[CapabilitySpec]) -> Self {
        let mut definitions: Vec<ToolDefinition> = specs
            .iter()
            .map(|spec| ToolDefinition {
                name: ToolName::new(spec.name),
                description: spec.description.to_string(),
                parameters: spec
                    .params
                    .iter()
                    .map(|p| ToolParameter {
                        name: p.name.to_string(),
                        ty: p.ty.unwrap_or(ParamType::String),
                        required: p.default.is_none(),
                        description: p.description.to_string(),
                    })
                    .collect(),
            })
            .collect();
        definitions.push(finish_definition());
        Self { definitions }
    }

    pub fn for_executor(executor: &dyn ActionExecutor) -> Self {
        Self::from_capabilities(executor.capabilities())
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    /// One `name(param: type, ...)` line per tool, for the system prompt.
    pub fn signatures(&self) -> Vec<String> {
        self.definitions
            .iter()
            .map(|d| {
                let params = d
                    .parameters
                    .iter()
                    .map(|p| {
                        let optional = if p.required { "" } else { "?" };
                        format!("{}{optional}: {}", p.name, p.ty.as_str())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({params}) - {}", d.name, d.description)
            })
            .collect()
    }

    /// Check a call against its declared parameters before dispatch.
    /// Arguments the definition does not declare are ignored.
    pub fn validate(&self, call: &ToolCall) -> Result<&ToolDefinition, ToolError> {
        let def = self
            .get(call.name.as_str())
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        if let Some(reason) = &call.argument_error {
            return Err(ToolError::InvalidArguments {
                tool: call.name.clone(),
                reason: reason.clone(),
            });
        }

        for param in &def.parameters {
            match call.arguments.get(&param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ToolError::InvalidArguments {
                        tool: call.name.clone(),
                        reason: format!("missing required parameter '{}'", param.name),
                    });
                }
                Some(value) if !value.is_null() && !param.ty.matches(value) => {
                    return Err(ToolError::InvalidArguments {
                        tool: call.name.clone(),
                        reason: format!(
                            "parameter '{}' must be of type {}",
                            param.name,
                            param.ty.as_str()
                        ),
                    });
                }
                _ => {}
            }
        }

        Ok(def)
    }
}

/// Typed accessors over a call's argument map.
pub(crate) struct ToolArgs<'a> {
    args: &'a Map<String, Value>,
}

impl<'a> ToolArgs<'a> {
    pub fn new(args: &'a Map<String, Value>) -> Self {
        Self { args }
    }

    pub fn get_str(&self, key: &str) -> Result<&'a str, ToolError> {
        self.opt_str(key)?
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ToolError::InvalidParameterType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Err(ToolError::MissingParameter(key.to_string())),
            Some(v) => v.as_i64().ok_or_else(|| ToolError::InvalidParameterType {
                key: key.to_string(),
                expected: "integer",
            }),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<u64, ToolError> {
        match self.args.get(key) {
            None | Some(Value::Null) => Err(ToolError::MissingParameter(key.to_string())),
            Some(v) => v.as_u64().ok_or_else(|| ToolError::InvalidParameterType {
                key: key.to_string(),
                expected: "non-negative integer",
            }),
        }
    }
}

/// Default value declared for a parameter, if any.
fn declared_default(specs: &[CapabilitySpec], tool: &str, param: &str) -> Option<&'static str> {
    specs
        .iter()
        .find(|s| s.name == tool)
        .and_then(|s| s.params.iter().find(|p| p.name == param))
        .and_then(|p| p.default)
}

/// Run one capability on the executor and stringify its output.
///
/// The caller is expected to have validated the call against the catalog;
/// names without a matching executor method still report `NotFound`.
pub async fn invoke(
    executor: &mut dyn ActionExecutor,
    call: &ToolCall,
) -> Result<String, ToolError> {
    let args = ToolArgs::new(&call.arguments);
    let specs = executor.capabilities();
    let selector_or_default = |tool: &str| -> Result<String, ToolError> {
        match args.opt_str("selector")? {
            Some(s) => Ok(s.to_string()),
            None => declared_default(specs, tool, "selector")
                .map(str::to_string)
                .ok_or_else(|| ToolError::MissingParameter("selector".to_string())),
        }
    };

    match call.name.as_str() {
        "navigate" => executor.navigate(args.get_str("url")?).await,
        "click" => executor.click(&selector_or_default("click")?).await,
        "type_text" => {
            let selector = selector_or_default("type_text")?;
            executor.type_text(&selector, args.get_str("text")?).await
        }
        "get_text" => executor.get_text(&selector_or_default("get_text")?).await,
        "get_html" => executor.get_html(&selector_or_default("get_html")?).await,
        "scroll" => {
            executor
                .scroll(args.get_str("direction")?, args.get_i64("pixels")?)
                .await
        }
        "wait" => executor.wait(args.get_u64("seconds")?).await,
        "find_elements" => {
            let found = executor
                .find_elements(&selector_or_default("find_elements")?)
                .await?;
            serde_json::to_string(&found).map_err(|e| ToolError::Execution(e.to_string()))
        }
        _ => Err(ToolError::NotFound(call.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn registry_names_are_unique_and_exclude_finish() {
        let mut seen = HashSet::new();
        for spec in BROWSER_CAPABILITIES {
            assert!(seen.insert(spec.name), "duplicate capability {}", spec.name);
            assert_ne!(spec.name, FINISH_TOOL);
            let mut params = HashSet::new();
            for p in spec.params {
                assert!(params.insert(p.name), "duplicate param {} on {}", p.name, spec.name);
            }
        }
    }

    #[test]
    fn catalog_is_ordered_with_finish_last() {
        let catalog = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);
        assert_eq!(
            catalog.tool_names(),
            vec![
                "navigate",
                "click",
                "type_text",
                "get_text",
                "get_html",
                "scroll",
                "wait",
                "find_elements",
                "finish"
            ]
        );

        let finish = catalog.get(FINISH_TOOL).unwrap();
        assert_eq!(finish.parameters.len(), 1);
        assert_eq!(finish.parameters[0].name, "result");
        assert!(finish.parameters[0].required);
    }

    #[test]
    fn catalog_is_deterministic() {
        let a = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);
        let b = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(a.definitions()).unwrap(),
            serde_json::to_string(b.definitions()).unwrap()
        );
    }

    #[test]
    fn defaults_make_parameters_optional() {
        let catalog = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);
        let selector = catalog.get("get_html").unwrap().parameter("selector").unwrap();
        assert!(!selector.required);
        let pixels = catalog.get("scroll").unwrap().parameter("pixels").unwrap();
        assert!(pixels.required);
        assert_eq!(pixels.ty, ParamType::Integer);
    }

    #[test]
    fn undeclared_types_default_to_string() {
        const SPECS: &[CapabilitySpec] = &[CapabilitySpec {
            name: "hover",
            description: "Hover an element.",
            params: &[ParamSpec {
                name: "target",
                ty: None,
                default: None,
                description: "",
            }],
        }];
        let catalog = ToolCatalog::from_capabilities(SPECS);
        assert_eq!(catalog.tool_names(), vec!["hover", "finish"]);
        let param = catalog.get("hover").unwrap().parameter("target").unwrap();
        assert_eq!(param.ty, ParamType::String);
        assert!(param.required);
    }

    #[test]
    fn validate_rejects_missing_and_mistyped() {
        let catalog = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);

        let missing = ToolCall::new("1", "type_text", json!({"selector": "#q"}));
        let err = catalog.validate(&missing).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(err.to_string().contains("'text'"));

        let mistyped = ToolCall::new("2", "wait", json!({"seconds": "5"}));
        let err = catalog.validate(&mistyped).unwrap_err();
        assert!(err.to_string().contains("integer"));

        let unknown = ToolCall::new("3", "teleport", json!({}));
        assert!(matches!(
            catalog.validate(&unknown),
            Err(ToolError::NotFound(_))
        ));

        let ok = ToolCall::new("4", "get_html", json!({"extra": true}));
        assert!(catalog.validate(&ok).is_ok());
    }

    #[test]
    fn validate_reports_unreadable_arguments() {
        let catalog = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);
        let call = ToolCall::malformed("5", "click", "EOF while parsing an object");
        let err = catalog.validate(&call).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::InvalidArguments);
        assert_eq!(
            err.observation(),
            "Error: Invalid arguments for click: malformed JSON arguments: EOF while parsing an object"
        );
    }

    #[test]
    fn signatures_mark_optional_parameters() {
        let catalog = ToolCatalog::from_capabilities(BROWSER_CAPABILITIES);
        let sigs = catalog.signatures();
        assert!(sigs.iter().any(|s| s.starts_with("get_html(selector?: string)")));
        assert!(sigs.iter().any(|s| s.starts_with("scroll(direction: string, pixels: integer)")));
        assert!(sigs.last().unwrap().starts_with("finish(result: string)"));
    }

    #[tokio::test]
    async fn invoke_applies_declared_default_selector() {
        let mut exec = ScriptedExecutor::new();
        let call = ToolCall::new("1", "get_html", json!({}));
        let out = invoke(&mut exec, &call).await.unwrap();
        assert_eq!(out, "<html body>");
        assert_eq!(exec.calls(), vec!["get_html(body)".to_string()]);
    }

    #[tokio::test]
    async fn invoke_stringifies_structured_output() {
        let mut exec = ScriptedExecutor::new();
        let call = ToolCall::new("1", "find_elements", json!({"selector": "a"}));
        let out = invoke(&mut exec, &call).await.unwrap();
        assert_eq!(out, r#"[{"tag":"a"},{"tag":"button"}]"#);
    }

    #[tokio::test]
    async fn invoke_surfaces_capability_failure() {
        let mut exec = ScriptedExecutor::new().failing_on("click");
        let call = ToolCall::new("1", "click", json!({"selector": "#gone"}));
        let err = invoke(&mut exec, &call).await.unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::ToolExecution);
        assert_eq!(err.observation(), "Error: click failed on #gone");
    }
}
